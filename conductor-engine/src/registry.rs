//! The process-wide action registry: a read-only map built once at startup.

use std::collections::HashMap;

use conductor_core::action::{Action, LlmOutput, Step};
use conductor_core::error::ConductorError;

#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
}

impl ActionRegistry {
    /// Union the declared action set and validate every cross-reference.
    pub fn build(actions: Vec<Action>) -> Result<Self, ConductorError> {
        let mut registry = Self {
            actions: HashMap::new(),
        };
        for action in actions {
            registry.actions.insert(action.name.clone(), action);
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Result<&Action, ConductorError> {
        self.actions
            .get(name)
            .ok_or_else(|| ConductorError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Every referenced action name must resolve: sub-action steps,
    /// tool-choice available actions, and stop actions.
    fn validate(&self) -> Result<(), ConductorError> {
        let mut reasons = Vec::new();

        for (name, action) in &self.actions {
            if action.steps.is_empty() {
                reasons.push(format!("action '{name}' declares no steps"));
            }
            for (index, step) in action.steps.iter().enumerate() {
                match step {
                    Step::SubAction { action: target, .. } => {
                        if !self.contains(target) {
                            reasons.push(format!(
                                "action '{name}' step {index} references unknown action '{target}'"
                            ));
                        }
                    }
                    Step::Llm(llm) => {
                        if let LlmOutput::ToolChoice(choice) = &llm.output {
                            if let Err(err) = choice.validate() {
                                reasons.push(format!("action '{name}' step {index}: {err}"));
                            }
                            for target in &choice.available_actions {
                                if !self.contains(target) {
                                    reasons.push(format!(
                                        "action '{name}' step {index} lists unknown action '{target}'"
                                    ));
                                }
                            }
                        }
                    }
                    Step::Procedure(_) => {}
                }
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConductorError::validation(reasons))
        }
    }
}
