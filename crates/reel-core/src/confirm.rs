//! Confirmation Gate
//!
//! Optional human approval step awaited before a tool call is dispatched.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::tool::ToolArguments;

/// Approves or declines a pending tool call
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, tool_name: &str, arguments: &ToolArguments) -> bool;
}

/// Gate backed by a closure returning a boxed future
pub struct FnGate<F> {
    f: F,
}

impl<F> FnGate<F>
where
    F: Fn(String, ToolArguments) -> BoxFuture<'static, bool> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ConfirmationGate for FnGate<F>
where
    F: Fn(String, ToolArguments) -> BoxFuture<'static, bool> + Send + Sync,
{
    async fn confirm(&self, tool_name: &str, arguments: &ToolArguments) -> bool {
        (self.f)(tool_name.to_string(), arguments.clone()).await
    }
}

/// Gate that answers the same way every time
#[derive(Clone, Copy, Debug)]
pub struct StaticGate(pub bool);

#[async_trait]
impl ConfirmationGate for StaticGate {
    async fn confirm(&self, _tool_name: &str, _arguments: &ToolArguments) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_fn_gate_sees_name_and_arguments() {
        let gate = FnGate::new(|name: String, args: ToolArguments| {
            async move { name.starts_with("project_") && args.contains_key("name") }.boxed()
        });

        let mut args = ToolArguments::new();
        assert!(!gate.confirm("project_create", &args).await);
        args.insert("name".into(), serde_json::json!("demo"));
        assert!(gate.confirm("project_create", &args).await);
        assert!(!gate.confirm("export_render", &args).await);
    }

    #[tokio::test]
    async fn test_static_gate() {
        assert!(StaticGate(true).confirm("x", &ToolArguments::new()).await);
        assert!(!StaticGate(false).confirm("x", &ToolArguments::new()).await);
    }
}
