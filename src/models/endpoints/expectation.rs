use crate::models::message::Message;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// An assertion about the messages a capture endpoint has received.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    MessageCount(usize),
    MinimumMessageCount(usize),
    /// Body text per message, `None` for an empty body.
    Bodies {
        expected: Vec<Option<String>>,
        ordered: bool,
    },
    /// Every received message carries `key` with exactly this value.
    Header { key: String, value: Value },
}

impl Expectation {
    /// `Err` carries a description of what was actually observed.
    pub fn check(&self, received: &[Message]) -> Result<(), String> {
        match self {
            Expectation::MessageCount(n) if received.len() != *n => {
                Err(format!("{} messages", received.len()))
            }
            Expectation::MinimumMessageCount(n) if received.len() < *n => {
                Err(format!("{} messages", received.len()))
            }
            Expectation::Bodies { expected, ordered } => {
                let actual: Vec<Option<String>> = received.iter().map(|m| m.body.to_text()).collect();
                let equal = if *ordered {
                    &actual == expected
                } else {
                    let mut actual_sorted = actual.clone();
                    let mut expected_sorted = expected.clone();
                    actual_sorted.sort();
                    expected_sorted.sort();
                    actual_sorted == expected_sorted
                };
                if equal {
                    Ok(())
                } else {
                    Err(format!("bodies {}", describe_bodies(&actual)))
                }
            }
            Expectation::Header { key, value } => {
                let mismatches: Vec<String> = received
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.header(key) != Some(value))
                    .map(|(i, m)| match m.header(key) {
                        Some(actual) => format!("message {} had {}", i, actual),
                        None => format!("message {} had no header", i),
                    })
                    .collect();
                if mismatches.is_empty() {
                    Ok(())
                } else {
                    Err(mismatches.join(", "))
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::MessageCount(n) => write!(f, "exactly {} messages", n),
            Expectation::MinimumMessageCount(n) => write!(f, "at least {} messages", n),
            Expectation::Bodies { expected, ordered: true } => {
                write!(f, "bodies {} in order", describe_bodies(expected))
            }
            Expectation::Bodies { expected, ordered: false } => {
                write!(f, "bodies {} in any order", describe_bodies(expected))
            }
            Expectation::Header { key, value } => write!(f, "header {} = {} on every message", key, value),
        }
    }
}

fn describe_bodies(bodies: &[Option<String>]) -> String {
    let items: Vec<String> = bodies
        .iter()
        .map(|b| match b {
            Some(text) => format!("{:?}", text),
            None => "null".to_string(),
        })
        .collect();
    format!("[{}]", items.join(", "))
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmetExpectation {
    pub expectation: Expectation,
    pub observed: String,
}

impl fmt::Display for UnmetExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, observed {}", self.expectation, self.observed)
    }
}

#[derive(Debug, Error)]
pub enum ExpectationError {
    #[error("Capture endpoint '{endpoint}' not satisfied after {waited_ms}ms: {}", join(.failures))]
    Unsatisfied {
        endpoint: String,
        waited_ms: u128,
        failures: Vec<UnmetExpectation>,
    },
}

fn join(failures: &[UnmetExpectation]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
