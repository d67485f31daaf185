pub mod calculator;
pub mod todo;
pub mod weather;

pub use calculator::CalculatorTool;
pub use todo::{AddTodoTool, CompleteTodoTool, DeleteTodoTool, ListTodosTool};
pub use weather::{WeatherReport, WeatherTool, DEFAULT_WEATHER_BASE_URL};
