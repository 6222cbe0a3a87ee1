use crate::stages::Stage;

/// One stage together with the command-line text that produced it.
#[derive(Debug)]
pub struct PipelineStep {
    pub stage: Stage,
    /// Flag and parameters as typed, e.g. `--sort desc`; used in diagnostics.
    pub invocation: String,
}

/// Ordered stages built from one command line. Runs once, left to right.
#[derive(Debug, Default)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }
}

impl IntoIterator for Pipeline {
    type Item = PipelineStep;
    type IntoIter = std::vec::IntoIter<PipelineStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
