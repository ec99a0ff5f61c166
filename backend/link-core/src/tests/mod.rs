mod backoff;
mod config;
mod credentials;
mod support;
