/// An operation a flow hands to the driver to run against the allocation
/// service. The flows themselves are pure step machines (`advance` maps
/// current step plus new input to the next step and an output), free of
/// any transport types, so a dialogue can be driven synchronously in
/// tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    Propose { count: i64 },
    Confirm,
    Cancel,
    Import { text: String },
}

/// What a step hands back: something to show, something to run, or both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowOutput {
    pub prompt: Option<String>,
    pub action: Option<FlowAction>,
}

impl FlowOutput {
    fn prompt(text: &str) -> Self {
        Self {
            prompt: Some(text.to_string()),
            action: None,
        }
    }

    fn action(action: FlowAction) -> Self {
        Self {
            prompt: None,
            action: Some(action),
        }
    }

    fn both(text: &str, action: FlowAction) -> Self {
        Self {
            prompt: Some(text.to_string()),
            action: Some(action),
        }
    }
}

/// The propose dialogue: ask for a count, run the proposal, then wait for
/// a yes/no decision on the presented selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposeFlow {
    AwaitCount,
    AwaitDecision,
    Finished,
}

impl ProposeFlow {
    pub fn start() -> (Self, FlowOutput) {
        (
            Self::AwaitCount,
            FlowOutput::prompt("How many rewards should be allocated?"),
        )
    }

    pub fn advance(self, input: &str) -> (Self, FlowOutput) {
        match self {
            Self::AwaitCount => match input.trim().parse::<i64>() {
                Ok(count) if count > 0 => (
                    Self::AwaitDecision,
                    FlowOutput::both(
                        "Confirm this selection? (yes/no)",
                        FlowAction::Propose { count },
                    ),
                ),
                _ => (
                    Self::AwaitCount,
                    FlowOutput::prompt("Please give a positive number."),
                ),
            },
            Self::AwaitDecision => match input.trim().to_lowercase().as_str() {
                "yes" | "y" => (Self::Finished, FlowOutput::action(FlowAction::Confirm)),
                "no" | "n" => (Self::Finished, FlowOutput::action(FlowAction::Cancel)),
                _ => (
                    Self::AwaitDecision,
                    FlowOutput::prompt("Please answer yes or no."),
                ),
            },
            Self::Finished => (Self::Finished, FlowOutput::default()),
        }
    }
}

/// The import dialogue: collect the pasted `"label: count"` block, then
/// hand it to the service in one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFlow {
    AwaitText,
    Finished,
}

impl ImportFlow {
    pub fn start() -> (Self, FlowOutput) {
        (
            Self::AwaitText,
            FlowOutput::prompt("Paste the counts, one \"name: count\" per line."),
        )
    }

    pub fn advance(self, input: &str) -> (Self, FlowOutput) {
        match self {
            Self::AwaitText => {
                if input.trim().is_empty() {
                    (
                        Self::AwaitText,
                        FlowOutput::prompt("Nothing to import; paste at least one line."),
                    )
                } else {
                    (
                        Self::Finished,
                        FlowOutput::action(FlowAction::Import {
                            text: input.to_string(),
                        }),
                    )
                }
            }
            Self::Finished => (Self::Finished, FlowOutput::default()),
        }
    }
}
