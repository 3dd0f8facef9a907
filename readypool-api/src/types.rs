use crate::errors::PoolError;
use crate::worker::Worker;

// Type aliases for common types
pub type BoxedWorker<I, O> = Box<dyn Worker<Input = I, Output = O>>;
pub type PoolResult<T> = Result<T, PoolError>;
pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type Completion<O> = Box<dyn FnOnce(PoolResult<O>) + Send + 'static>;
