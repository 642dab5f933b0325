//! Mock converter for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{ConversionError, Converter};

/// Prefix prepended by [`MockConverter::echoing`].
pub const ECHO_PREFIX: &[u8] = b"%PDF-mock:";

#[derive(Debug, Clone)]
enum Behavior {
    Return(Vec<u8>),
    Echo,
    FailStatus { status: u16, body: String },
    FailTransport(String),
    Panic,
}

/// Mock implementation of the Converter trait.
///
/// Records every input it receives and answers according to the behavior it
/// was built with:
/// - [`MockConverter::returning`]: fixed output
/// - [`MockConverter::echoing`]: output derived from the input, so tests can
///   tell which job produced which result
/// - [`MockConverter::failing_with_status`] / [`MockConverter::unreachable`]
/// - [`MockConverter::panicking`]
///
/// # Example
///
/// ```rust,ignore
/// let converter = MockConverter::returning(b"%PDF".to_vec())
///     .with_delay(Duration::from_millis(50));
/// // ... run a job ...
/// assert_eq!(converter.calls(), 1);
/// ```
#[derive(Debug)]
pub struct MockConverter {
    behavior: Behavior,
    delay: Option<Duration>,
    inputs: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockConverter {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn returning(output: Vec<u8>) -> Self {
        Self::with_behavior(Behavior::Return(output))
    }

    pub fn echoing() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    pub fn failing_with_status(status: u16, body: &str) -> Self {
        Self::with_behavior(Behavior::FailStatus {
            status,
            body: body.to_string(),
        })
    }

    pub fn unreachable() -> Self {
        Self::with_behavior(Behavior::FailTransport("connection refused".to_string()))
    }

    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of conversions started so far.
    pub fn calls(&self) -> usize {
        self.lock_inputs().len()
    }

    /// Inputs received, in call order.
    pub fn inputs(&self) -> Vec<Vec<u8>> {
        self.lock_inputs().clone()
    }

    /// What [`MockConverter::echoing`] returns for `input`.
    pub fn echo_of(input: &[u8]) -> Vec<u8> {
        [ECHO_PREFIX, input].concat()
    }

    fn lock_inputs(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.inputs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        self.lock_inputs().push(input.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Return(output) => Ok(output.clone()),
            Behavior::Echo => Ok(Self::echo_of(input)),
            Behavior::FailStatus { status, body } => Err(ConversionError::Status {
                status: *status,
                body: body.clone(),
            }),
            Behavior::FailTransport(reason) => Err(ConversionError::Transport(reason.clone())),
            Behavior::Panic => panic!("mock converter panicked"),
        }
    }
}
