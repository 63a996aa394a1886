//! # Priority Rule Engine
//!
//! Recursive AND/OR rule trees evaluated against a task's flattened tag map
//! (and, for bounds rules, its point location) to classify the task into a
//! priority tier.
//!
//! ## Rule Trees
//!
//! A tree is either a branch combining child rules with AND/OR, or a leaf
//! comparing one tag (or the task location) against a literal. A leaf's raw
//! `value` field encodes `"<key>.<value>"`; splitting on the first `.`
//! yields the tag key and the comparison literal. Trees are validated with
//! [`is_valid_rule`] before being stored on a challenge; evaluation assumes
//! a well-formed tree and reports anything else as a
//! [`PipelineError::RuleEvaluation`].
//!
//! Classification walks the challenge's ordered cascade (high, medium, low);
//! the first matching rule wins, and the challenge's default priority is the
//! fallback when nothing matches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{Challenge, Point, Task, TaskPriority};

/// A node in a priority rule tree.
///
/// Deserialized untagged: branches carry a `rules` array, leaves carry an
/// `operator`/`value`/`valueType` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Branch {
        /// `"OR"` selects disjunction; anything else (or absence) means AND
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
        rules: Vec<RuleNode>,
    },
    Leaf {
        /// Display key as authored; evaluation derives the effective key
        /// from the encoded `value` field
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        operator: String,
        value: String,
        #[serde(rename = "valueType")]
        value_type: String,
    },
}

impl RuleNode {
    /// Check that every leaf's encoded value splits into two non-empty
    /// parts on the first `.`, recursively through branches, and that no
    /// branch is empty.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Branch { rules, .. } => {
                !rules.is_empty() && rules.iter().all(RuleNode::is_well_formed)
            }
            Self::Leaf { value, .. } => split_encoded(value).is_some(),
        }
    }
}

/// Validate a serialized rule tree before it is stored on a challenge.
pub fn is_valid_rule(raw: &str) -> bool {
    match serde_json::from_str::<RuleNode>(raw) {
        Ok(rule) => rule.is_well_formed(),
        Err(_) => false,
    }
}

/// Split a leaf's raw value into `(key, literal)` on the first `.`,
/// requiring both parts to be non-empty.
fn split_encoded(value: &str) -> Option<(&str, &str)> {
    let (key, literal) = value.split_once('.')?;
    if key.is_empty() || literal.is_empty() {
        None
    } else {
        Some((key, literal))
    }
}

/// Evaluate a rule tree against a task's tag map and location.
pub fn matches(
    rule: &RuleNode,
    properties: &HashMap<String, String>,
    location: Option<&Point>,
) -> Result<bool> {
    match rule {
        RuleNode::Branch { condition, rules } => {
            let disjunction = condition.as_deref() == Some("OR");
            if disjunction {
                for child in rules {
                    if matches(child, properties, location)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            } else {
                for child in rules {
                    if !matches(child, properties, location)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
        RuleNode::Leaf {
            operator,
            value,
            value_type,
            ..
        } => match value_type.as_str() {
            "bounds" => evaluate_bounds(operator, value, location),
            "string" => {
                let (key, literal) = split_leaf_value(value)?;
                evaluate_string(operator, key, literal, properties)
            }
            "integer" | "long" => {
                let (key, literal) = split_leaf_value(value)?;
                let expected: i64 = parse_number(literal)?;
                let actual: i64 = parse_number(&lookup(properties, key).unwrap_or_default())?;
                compare_ordered(operator, &actual, &expected)
            }
            "double" => {
                let (key, literal) = split_leaf_value(value)?;
                let expected: f64 = parse_number(literal)?;
                let actual: f64 = parse_number(&lookup(properties, key).unwrap_or_default())?;
                compare_ordered(operator, &actual, &expected)
            }
            other => Err(PipelineError::RuleEvaluation(format!(
                "unsupported value type '{other}'"
            ))),
        },
    }
}

/// Classify a property bag and location into a priority tier using the
/// challenge's ordered rule cascade; the first matching rule wins.
pub fn classify(
    challenge: &Challenge,
    properties: &HashMap<String, String>,
    location: Option<&Point>,
) -> Result<TaskPriority> {
    for (tier, rule) in challenge.priority_cascade() {
        if let Some(rule) = rule {
            if matches(rule, properties, location)? {
                return Ok(tier);
            }
        }
    }
    Ok(challenge.default_priority)
}

/// Classify a persisted task against its challenge's current rules.
pub fn classify_task(challenge: &Challenge, task: &Task) -> Result<TaskPriority> {
    classify(challenge, &task.properties, task.location.as_ref())
}

fn split_leaf_value(value: &str) -> Result<(&str, &str)> {
    split_encoded(value).ok_or_else(|| {
        PipelineError::RuleEvaluation(format!("malformed rule value '{value}'"))
    })
}

/// Case-insensitive key lookup in the flattened tag map
fn lookup(properties: &HashMap<String, String>, key: &str) -> Option<String> {
    properties
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
        .map(|(_, value)| value.clone())
}

fn evaluate_string(
    operator: &str,
    key: &str,
    literal: &str,
    properties: &HashMap<String, String>,
) -> Result<bool> {
    let actual = lookup(properties, key).unwrap_or_default();
    match operator {
        "equal" => Ok(actual == literal),
        "not_equal" => Ok(actual != literal),
        "contains" => Ok(actual.contains(literal)),
        "not_contains" => Ok(!actual.contains(literal)),
        "is_empty" => Ok(actual.is_empty()),
        "is_not_empty" => Ok(!actual.is_empty()),
        other => Err(PipelineError::RuleEvaluation(format!(
            "unsupported string operator '{other}'"
        ))),
    }
}

/// Bounds leaves test the task location against a `minX,minY,maxX,maxY`
/// box. Unknown operators are not satisfied rather than raising an error.
fn evaluate_bounds(operator: &str, raw: &str, location: Option<&Point>) -> Result<bool> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|e| {
                PipelineError::RuleEvaluation(format!("invalid bounds '{raw}': {e}"))
            })
        })
        .collect::<Result<_>>()?;
    if parts.len() != 4 {
        return Err(PipelineError::RuleEvaluation(format!(
            "bounds '{raw}' must contain exactly four comma-separated values"
        )));
    }
    let (min_x, min_y, max_x, max_y) = (parts[0], parts[1], parts[2], parts[3]);
    let inside = location
        .map(|p| p.x > min_x && p.x < max_x && p.y > min_y && p.y < max_y)
        .unwrap_or(false);
    match operator {
        "contains" => Ok(inside),
        "not_contains" => Ok(!inside),
        _ => Ok(false),
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        PipelineError::RuleEvaluation(format!("non-numeric value '{raw}': {e}"))
    })
}

fn compare_ordered<T: PartialOrd>(operator: &str, actual: &T, expected: &T) -> Result<bool> {
    match operator {
        "==" => Ok(actual == expected),
        "!=" => Ok(actual != expected),
        "<" => Ok(actual < expected),
        "<=" => Ok(actual <= expected),
        ">" => Ok(actual > expected),
        ">=" => Ok(actual >= expected),
        other => Err(PipelineError::RuleEvaluation(format!(
            "unsupported comparison operator '{other}'"
        ))),
    }
}
