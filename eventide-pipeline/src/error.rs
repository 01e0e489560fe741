use eventide_core::error::EventError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// 某个中间件或终端处理器返回错误，剩余链路被中止
    #[error("pipeline aborted: event={event}, reason={source:#}")]
    Aborted {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("middleware already registered: name={name}")]
    AlreadyRegistered { name: String },

    #[error("event: {0}")]
    Event(#[from] EventError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
