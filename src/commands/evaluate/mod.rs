mod pipeline;
mod provider_handle;
mod run;

pub(crate) use run::run;
