//! Built-in tools: calculator, TODO list and weather.
//!
//! Every tool implements [`agent_core::Tool`] and is dispatched through the
//! registry held by [`BuiltinToolExecutor`].

mod executor;
pub mod tools;

pub use executor::{BuiltinToolExecutor, BuiltinToolExecutorBuilder, BUILTIN_TOOL_NAMES};

pub use tools::{
    AddTodoTool, CalculatorTool, CompleteTodoTool, DeleteTodoTool, ListTodosTool, WeatherReport,
    WeatherTool, DEFAULT_WEATHER_BASE_URL,
};
