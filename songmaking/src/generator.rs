// The shared generation contract.
//
// All three algorithms (random, scored, markov) implement `MelodyGenerator`:
// a pure function of (context, seed, structure) given the configuration the
// generator was built with. Each call seeds its own `SeededRng`, so equal
// inputs give identical candidates and calls never influence each other.
//
// `Method` is the tagged selector the engine dispatches on.

use crate::context::HarmonicContext;
use crate::error::{ConfigError, GenerateError};
use crate::melody::Candidate;
use crate::structure::StructureSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub trait MelodyGenerator {
    fn method(&self) -> Method;

    /// Produce one candidate. `structure` must already be active (the engine
    /// drops inactive specs), though generators also ignore inactive ones.
    fn generate(
        &self,
        context: &HarmonicContext,
        seed: u64,
        structure: Option<&StructureSpec>,
    ) -> Result<Candidate, GenerateError>;
}

/// Which generation algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Random,
    Scored,
    Markov,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Random, Method::Scored, Method::Markov];

    pub fn name(self) -> &'static str {
        match self {
            Method::Random => "random",
            Method::Scored => "scored",
            Method::Markov => "markov",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownMethod(s.to_string()))
    }
}
