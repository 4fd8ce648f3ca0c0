use async_trait::async_trait;

use super::{execute, ExecutionRequest, ExecutionResult};

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult;
}

/// Runs commands for real, mirroring their output to the job log.
pub struct ConsoleRunner;

#[async_trait]
impl CommandRunner for ConsoleRunner {
    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        execute(request).await
    }
}

#[async_trait]
impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        (**self).run(request).await
    }
}
