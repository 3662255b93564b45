//! Train/test partitioning of the theorems found in a source file.
//!
//! Training theorems are shown to the model as few-shot examples; test
//! theorems are the ones it has to prove. Each [`PartitionPolicy`] variant is
//! one selection rule.

use std::collections::HashSet;

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::theorem::Theorem;

/// Fraction of the token limit the training set may occupy.
const TOKEN_HEADROOM: f64 = 0.9;

/// Two disjoint, source-ordered lists of theorem names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    train: Vec<String>,
    test: Vec<String>,
}

impl Partition {
    /// Create a partition, rejecting names that appear in both lists.
    pub fn new(train: Vec<String>, test: Vec<String>) -> Result<Self> {
        let train_set: HashSet<&str> = train.iter().map(String::as_str).collect();
        if let Some(shared) = test.iter().find(|name| train_set.contains(name.as_str())) {
            return Err(Error::config(format!(
                "theorem `{}` is in both train and test",
                shared
            )));
        }
        Ok(Self { train, test })
    }

    pub fn train(&self) -> &[String] {
        &self.train
    }

    pub fn test(&self) -> &[String] {
        &self.test
    }

    pub fn is_train(&self, name: &str) -> bool {
        self.train.iter().any(|n| n == name)
    }

    pub fn is_test(&self, name: &str) -> bool {
        self.test.iter().any(|n| n == name)
    }
}

/// Rule that decides which theorems are shown and which are evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// No examples; every proved theorem is evaluated.
    All,
    /// Caller-supplied name lists.
    Explicit { train: Vec<String>, test: Vec<String> },
    /// Each proved theorem goes to train with probability `train_fraction`.
    /// Both lists are then subsampled down to `retention` of their size.
    RandomFraction {
        train_fraction: f64,
        #[serde(default = "default_retention")]
        retention: f64,
    },
    /// Unfinished theorems are evaluated, finished ones are examples.
    AdmittedVsSolved {
        #[serde(default)]
        token_limit: Option<usize>,
    },
}

fn default_retention() -> f64 {
    1.0
}

impl Default for PartitionPolicy {
    fn default() -> Self {
        Self::All
    }
}

impl PartitionPolicy {
    /// Short name used in log headers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "basic",
            Self::Explicit { .. } => "k_shot",
            Self::RandomFraction { .. } => "random_split",
            Self::AdmittedVsSolved { .. } => "solve_admitted",
        }
    }

    /// Check the policy parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::All | Self::AdmittedVsSolved { .. } => Ok(()),
            Self::Explicit { train, test } => {
                Partition::new(train.clone(), test.clone()).map(|_| ())
            }
            Self::RandomFraction {
                train_fraction,
                retention,
            } => {
                check_unit_interval("train_fraction", *train_fraction)?;
                check_unit_interval("retention", *retention)
            }
        }
    }

    /// Split `theorems` (in source order) according to the policy.
    pub fn partition<R: Rng + ?Sized>(&self, theorems: &[Theorem], rng: &mut R) -> Result<Partition> {
        self.validate()?;

        let partition = match self {
            Self::All => Partition::new(Vec::new(), proved_names(theorems))?,
            Self::Explicit { train, test } => explicit(theorems, train, test)?,
            Self::RandomFraction {
                train_fraction,
                retention,
            } => random_fraction(theorems, *train_fraction, *retention, rng)?,
            Self::AdmittedVsSolved { token_limit } => {
                admitted_vs_solved(theorems, *token_limit, rng)?
            }
        };

        debug!(
            policy = self.name(),
            train = partition.train().len(),
            test = partition.test().len(),
            "Partitioned theorems"
        );
        Ok(partition)
    }
}

/// Number of whitespace characters, the token estimate used for budgets.
pub fn whitespace_tokens(text: &str) -> usize {
    text.chars().filter(|c| c.is_whitespace()).count()
}

fn check_unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

fn proved_names(theorems: &[Theorem]) -> Vec<String> {
    theorems
        .iter()
        .filter(|t| t.is_proved())
        .map(|t| t.name.clone())
        .collect()
}

fn explicit(theorems: &[Theorem], train: &[String], test: &[String]) -> Result<Partition> {
    let known: HashSet<&str> = theorems.iter().map(|t| t.name.as_str()).collect();
    if let Some(missing) = train
        .iter()
        .chain(test)
        .find(|name| !known.contains(name.as_str()))
    {
        return Err(Error::config(format!(
            "theorem `{}` does not exist in the source file",
            missing
        )));
    }

    let in_source_order = |wanted: &[String]| -> Vec<String> {
        theorems
            .iter()
            .filter(|t| wanted.contains(&t.name))
            .map(|t| t.name.clone())
            .collect()
    };
    Partition::new(in_source_order(train), in_source_order(test))
}

fn random_fraction<R: Rng + ?Sized>(
    theorems: &[Theorem],
    train_fraction: f64,
    retention: f64,
    rng: &mut R,
) -> Result<Partition> {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for name in proved_names(theorems) {
        if rng.gen_bool(train_fraction) {
            train.push(name);
        } else {
            test.push(name);
        }
    }

    Partition::new(
        subsample(train, retention, rng),
        subsample(test, retention, rng),
    )
}

/// Keep `round(len * ratio)` uniformly chosen names, in their original order.
fn subsample<R: Rng + ?Sized>(names: Vec<String>, ratio: f64, rng: &mut R) -> Vec<String> {
    let keep = ((names.len() as f64) * ratio).round() as usize;
    if keep >= names.len() {
        return names;
    }
    let mut picked = index::sample(rng, names.len(), keep).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| names[i].clone()).collect()
}

fn admitted_vs_solved<R: Rng + ?Sized>(
    theorems: &[Theorem],
    token_limit: Option<usize>,
    rng: &mut R,
) -> Result<Partition> {
    let (solved, admitted): (Vec<&Theorem>, Vec<&Theorem>) =
        theorems.iter().partition(|t| t.is_proved());

    let mut train = solved.clone();
    if let Some(limit) = token_limit {
        let widest_target = admitted
            .iter()
            .map(|t| whitespace_tokens(&t.statement))
            .max()
            .unwrap_or(0);
        let cost = |t: &Theorem| {
            whitespace_tokens(&t.statement) + whitespace_tokens(t.proof_text().unwrap_or(""))
        };
        let mut total: usize = widest_target + train.iter().map(|t| cost(t)).sum::<usize>();
        let budget = TOKEN_HEADROOM * limit as f64;

        train.shuffle(rng);
        while total as f64 > budget {
            let Some(dropped) = train.pop() else {
                break;
            };
            total -= cost(dropped);
        }
        debug!(kept = train.len(), dropped = solved.len() - train.len(), "Trimmed training set to token budget");
    }

    let kept: HashSet<&str> = train.iter().map(|t| t.name.as_str()).collect();
    let train_names = solved
        .iter()
        .filter(|t| kept.contains(t.name.as_str()))
        .map(|t| t.name.clone())
        .collect();
    let test_names = admitted.iter().map(|t| t.name.clone()).collect();
    Partition::new(train_names, test_names)
}
