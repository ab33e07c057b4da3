mod orchestrator;
mod task_runner;
