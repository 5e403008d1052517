//! Shared test utilities

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use poml_nodes::capabilities::{Capability, CapabilityMap};
use poml_nodes::{Error, Renderer, Result, SdkBackend, SdkMessage, Variables};

/// Renderer with every optional capability absent
#[must_use]
pub fn bare_renderer() -> Renderer {
    Renderer::new(Arc::new(CapabilityMap::none()))
}

/// Renderer wired to a scripted SDK backend
#[must_use]
pub fn sdk_renderer(sdk: Arc<MockSdk>) -> Renderer {
    let caps = CapabilityMap::none().with(Capability::Sdk, true);
    Renderer::new(Arc::new(caps)).with_sdk(sdk)
}

/// SDK backend that returns a fixed response and records its calls
pub struct MockSdk {
    response: std::result::Result<Vec<SdkMessage>, String>,
    calls: Mutex<Vec<(String, Variables)>>,
}

impl MockSdk {
    pub fn succeeding(text: &str) -> Arc<Self> {
        Self::with_messages(vec![SdkMessage::unlabeled(text)])
    }

    pub fn with_messages(messages: Vec<SdkMessage>) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(messages),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, Variables)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SdkBackend for MockSdk {
    fn name(&self) -> &str {
        "mock"
    }

    fn render(
        &self,
        markup: &str,
        variables: &Variables,
        _base_dir: Option<&Path>,
    ) -> Result<Vec<SdkMessage>> {
        self.calls
            .lock()
            .unwrap()
            .push((markup.to_string(), variables.clone()));
        self.response.clone().map_err(Error::Sdk)
    }
}
