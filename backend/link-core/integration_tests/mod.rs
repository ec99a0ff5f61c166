mod authenticator;
mod error;
mod websocket;
