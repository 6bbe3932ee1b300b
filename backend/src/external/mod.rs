//! External API integrations

pub mod weather;

pub use weather::{BoxFuture, OpenWeatherClient, WeatherProvider};
