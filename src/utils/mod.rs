pub(crate) mod async_task;
pub(crate) mod runtime;

#[cfg(test)]
mod runtime_test;
