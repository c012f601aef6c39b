// src/controls.rs
use std::collections::BTreeMap;

use crate::session::{FollowerDisplaySink, VariableControlSink};

const MAX_LOG_LINES: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct Follower {
    pub name: String,
    pub latest_move_time: f64,
}

/// Side-panel state fed by the session: tunable variables, followers, a short log.
#[derive(Debug, Default)]
pub struct ControlPanel {
    variables: BTreeMap<String, f64>,
    followers: Vec<Follower>,
    log_messages: Vec<String>,
}

impl ControlPanel {
    pub fn variables(&self) -> &BTreeMap<String, f64> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut BTreeMap<String, f64> {
        &mut self.variables
    }

    /// Sorted by name.
    pub fn followers(&self) -> &[Follower] {
        &self.followers
    }

    pub fn log_messages(&self) -> &[String] {
        &self.log_messages
    }

    pub fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > MAX_LOG_LINES {
            self.log_messages.remove(0);
        }
    }
}

impl VariableControlSink for ControlPanel {
    fn seed_variables(&mut self, variables: &BTreeMap<String, f64>) {
        self.variables = variables.clone();
        self.log(&format!("{} variables from server", variables.len()));
    }
}

impl FollowerDisplaySink for ControlPanel {
    fn update_follower(&mut self, name: &str, latest_move_time: f64) {
        match self
            .followers
            .binary_search_by(|f| f.name.as_str().cmp(name))
        {
            Ok(i) => self.followers[i].latest_move_time = latest_move_time,
            Err(i) => self.followers.insert(
                i,
                Follower {
                    name: name.to_owned(),
                    latest_move_time,
                },
            ),
        }
    }
}
