//! Mock command runner for testing
//!
//! Records every command it is asked to run and answers with scripted
//! output. Unscripted commands succeed with empty output.
//!
//! ```rust,ignore
//! use dbtvgen_engine::{CommandOutput, MockRunner};
//!
//! let runner = MockRunner::new()
//!     .with_response("dbt --version", CommandOutput::ok("Core: 1.7.4"));
//! ```

use crate::exec::{CommandOutput, CommandRunner};
use dbtvgen_core::Result;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Scripted [`CommandRunner`]
#[derive(Debug, Default)]
pub struct MockRunner {
    /// Responses keyed by the full command line
    responses: HashMap<String, CommandOutput>,

    /// Programs `locate` reports as missing
    missing: HashSet<String>,

    calls: RefCell<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command_line` (program and arguments joined by spaces) with `output`
    pub fn with_response(mut self, command_line: &str, output: CommandOutput) -> Self {
        self.responses.insert(command_line.to_string(), output);
        self
    }

    /// Make `locate` fail for a program
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Command lines run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for MockRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing.contains(program) {
            None
        } else {
            Some(PathBuf::from("/usr/local/bin").join(program))
        }
    }

    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let mut command_line = program.to_string();
        for arg in args {
            command_line.push(' ');
            command_line.push_str(arg);
        }

        self.calls.borrow_mut().push(command_line.clone());
        Ok(self
            .responses
            .get(&command_line)
            .cloned()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}
