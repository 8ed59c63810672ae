use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Difficulty tiers and option tags
// ---------------------------------------------------------------------------

/// Difficulty tier of a question. Declaration order is the allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Hard,
    Medium,
    Easy,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Hard, Tier::Medium, Tier::Easy];

    /// Letter used for internal question codes (`H1`, `M5`, `E3`).
    pub fn prefix(self) -> char {
        match self {
            Tier::Hard   => 'H',
            Tier::Medium => 'M',
            Tier::Easy   => 'E',
        }
    }

    /// Map a free-form difficulty label onto a tier.
    ///
    /// Accepts H/Hard/High, M/Medium/Med, L/Low/E/Easy in any case, then falls
    /// back to the first letter (`"hardest"` → Hard, `"lo"` → Easy).
    pub fn parse(label: &str) -> Option<Tier> {
        let upper = label.trim().to_uppercase();
        match upper.as_str() {
            "H" | "HARD" | "HIGH"           => return Some(Tier::Hard),
            "M" | "MEDIUM" | "MED"          => return Some(Tier::Medium),
            "L" | "LOW" | "E" | "EASY"      => return Some(Tier::Easy),
            _ => {}
        }
        match upper.chars().next()? {
            'H'       => Some(Tier::Hard),
            'M'       => Some(Tier::Medium),
            'L' | 'E' => Some(Tier::Easy),
            _         => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Hard   => write!(f, "Hard"),
            Tier::Medium => write!(f, "Medium"),
            Tier::Easy   => write!(f, "Easy"),
        }
    }
}

/// One of the four multiple-choice positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionTag {
    A,
    B,
    C,
    D,
}

impl OptionTag {
    pub const ALL: [OptionTag; 4] = [OptionTag::A, OptionTag::B, OptionTag::C, OptionTag::D];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<OptionTag> {
        Self::ALL.get(index).copied()
    }

    /// Parse `"a"`, `" B "`, `"c"` … (trimmed, case-insensitive).
    pub fn parse(value: &str) -> Option<OptionTag> {
        match value.trim().to_uppercase().as_str() {
            "A" => Some(OptionTag::A),
            "B" => Some(OptionTag::B),
            "C" => Some(OptionTag::C),
            "D" => Some(OptionTag::D),
            _   => None,
        }
    }
}

impl fmt::Display for OptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptionTag::A => "A",
            OptionTag::B => "B",
            OptionTag::C => "C",
            OptionTag::D => "D",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Per-tier values
// ---------------------------------------------------------------------------

/// One value per tier: counts, percentages, statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierMap<T> {
    pub hard: T,
    pub medium: T,
    pub easy: T,
}

impl<T> TierMap<T> {
    pub const fn new(hard: T, medium: T, easy: T) -> Self {
        TierMap { hard, medium, easy }
    }

    pub fn get(&self, tier: Tier) -> &T {
        match tier {
            Tier::Hard   => &self.hard,
            Tier::Medium => &self.medium,
            Tier::Easy   => &self.easy,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut T {
        match tier {
            Tier::Hard   => &mut self.hard,
            Tier::Medium => &mut self.medium,
            Tier::Easy   => &mut self.easy,
        }
    }

    /// Iterate in tier order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &T)> {
        Tier::ALL.into_iter().map(move |t| (t, self.get(t)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Tier, &T) -> U) -> TierMap<U> {
        TierMap {
            hard: f(Tier::Hard, &self.hard),
            medium: f(Tier::Medium, &self.medium),
            easy: f(Tier::Easy, &self.easy),
        }
    }
}

impl TierMap<usize> {
    pub fn total(&self) -> usize {
        self.hard + self.medium + self.easy
    }
}

impl fmt::Display for TierMap<usize> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}H + {}M + {}E", self.hard, self.medium, self.easy)
    }
}

// ---------------------------------------------------------------------------
// Question bank input
// ---------------------------------------------------------------------------

/// Untyped tabular input: a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A fully validated question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The bank's `question_no`; unique across the pool.
    pub number: u32,
    /// Tier prefix plus 1-based ordinal within the tier, e.g. `"M5"`.
    pub code: String,
    pub text: String,
    pub options: [String; 4],
    pub answer: OptionTag,
    pub tier: Tier,
}

impl Question {
    pub fn option(&self, tag: OptionTag) -> &str {
        &self.options[tag.index()]
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Which parts of a paper are reordered for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleMode {
    None,
    OptionsOnly,
    #[default]
    QuestionsOnly,
    Both,
}

impl ShuffleMode {
    pub fn shuffles_questions(self) -> bool {
        matches!(self, ShuffleMode::QuestionsOnly | ShuffleMode::Both)
    }

    pub fn shuffles_options(self) -> bool {
        matches!(self, ShuffleMode::OptionsOnly | ShuffleMode::Both)
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShuffleMode::None          => "none",
            ShuffleMode::OptionsOnly   => "options",
            ShuffleMode::QuestionsOnly => "questions",
            ShuffleMode::Both          => "both",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ShuffleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "none" | "off"                  => Ok(ShuffleMode::None),
            "options" | "options_only"      => Ok(ShuffleMode::OptionsOnly),
            "questions" | "questions_only"  => Ok(ShuffleMode::QuestionsOnly),
            "both" | "all"                  => Ok(ShuffleMode::Both),
            other => Err(format!(
                "unknown shuffle mode '{other}' (expected none, options, questions or both)"
            )),
        }
    }
}

/// What to do when a set needs more questions of a tier than the tier holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Wrap around the bucket and repeat questions inside the set.
    #[default]
    Duplicate,
    /// Use every bucket question once and leave the rest of the slot empty.
    Truncate,
    /// Abort the run before allocating anything.
    Reject,
}

impl fmt::Display for ShortfallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShortfallPolicy::Duplicate => "duplicate",
            ShortfallPolicy::Truncate  => "truncate",
            ShortfallPolicy::Reject    => "reject",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ShortfallPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duplicate" | "wrap" => Ok(ShortfallPolicy::Duplicate),
            "truncate"           => Ok(ShortfallPolicy::Truncate),
            "reject" | "strict"  => Ok(ShortfallPolicy::Reject),
            other => Err(format!(
                "unknown shortfall policy '{other}' (expected duplicate, truncate or reject)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Allocation output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEntry {
    pub question_no: u32,
    pub tier: Tier,
}

/// One quiz paper before shuffling: entries grouped by tier, in pick order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedSet {
    /// 1-based set number.
    pub set_no: usize,
    pub entries: Vec<SetEntry>,
}

impl AllocatedSet {
    pub fn question_numbers(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.question_no).collect()
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.entries.iter().filter(|e| e.tier == tier).count()
    }

    /// Number of different questions of `tier` in this set.
    pub fn distinct(&self, tier: Tier) -> usize {
        let mut nos: Vec<u32> = self
            .entries
            .iter()
            .filter(|e| e.tier == tier)
            .map(|e| e.question_no)
            .collect();
        nos.sort_unstable();
        nos.dedup();
        nos.len()
    }
}

/// Set number → selected questions. Built once by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTable {
    sets: Vec<AllocatedSet>,
}

impl AllocationTable {
    pub(crate) fn new(sets: Vec<AllocatedSet>) -> Self {
        AllocationTable { sets }
    }

    pub fn sets(&self) -> &[AllocatedSet] {
        &self.sets
    }

    pub fn set(&self, set_no: usize) -> Option<&AllocatedSet> {
        self.sets.iter().find(|s| s.set_no == set_no)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Longest paper, used to size tabular exports.
    pub fn max_set_len(&self) -> usize {
        self.sets.iter().map(|s| s.entries.len()).max().unwrap_or(0)
    }
}

/// A draw where the tier bucket was smaller than the set's required count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub set_no: usize,
    pub tier: Tier,
    pub required: usize,
    pub available: usize,
    pub allocated: usize,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Set_{}: needs {} {} question(s) but only {} exist ({} allocated)",
            self.set_no, self.required, self.tier, self.available, self.allocated
        )
    }
}

// ---------------------------------------------------------------------------
// Presentation output
// ---------------------------------------------------------------------------

/// A question as printed on a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedQuestion {
    pub question_no: u32,
    pub tier: Tier,
    /// `option_order[i]` is the original tag printed at position `i`.
    pub option_order: [OptionTag; 4],
    /// Correct tag as printed on this paper.
    pub answer: OptionTag,
}

impl PresentedQuestion {
    /// Original tag behind the printed position `shown`.
    pub fn original_tag(&self, shown: OptionTag) -> OptionTag {
        self.option_order[shown.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffledSet {
    pub set_no: usize,
    pub questions: Vec<PresentedQuestion>,
}

impl ShuffledSet {
    pub fn question_numbers(&self) -> Vec<u32> {
        self.questions.iter().map(|q| q.question_no).collect()
    }
}

/// Presentation order of every set. Derived from an [`AllocationTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffledTable {
    sets: Vec<ShuffledSet>,
}

impl ShuffledTable {
    pub(crate) fn new(sets: Vec<ShuffledSet>) -> Self {
        ShuffledTable { sets }
    }

    pub fn sets(&self) -> &[ShuffledSet] {
        &self.sets
    }

    pub fn set(&self, set_no: usize) -> Option<&ShuffledSet> {
        self.sets.iter().find(|s| s.set_no == set_no)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn max_set_len(&self) -> usize {
        self.sets.iter().map(|s| s.questions.len()).max().unwrap_or(0)
    }
}
