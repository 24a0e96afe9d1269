//! The three tools the analyzer model may call.
//!
//! The catalog is static: descriptors are `const` data and the wire-format
//! definitions are built once per process.

use std::sync::OnceLock;

use serde_json::{json, Map, Value};

use crate::inference::types::{FunctionDefinition, ToolDefinition};

pub const VIEW_FILE: &str = "view_file";
pub const VIEW_FOLDER: &str = "view_folder";
pub const GENERATE_SUMMARY: &str = "generate_summary";

/// One string parameter of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Name, description and flat string-parameter schema of one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ToolParameter],
}

pub static TOOL_CATALOG: [ToolDescriptor; 3] = [
    ToolDescriptor {
        name: VIEW_FILE,
        description: "View the contents of a file in the repository",
        parameters: &[ToolParameter {
            name: "path",
            description: "The path of the file to view",
            required: true,
        }],
    },
    ToolDescriptor {
        name: VIEW_FOLDER,
        description: "View the contents of a folder in the repository",
        parameters: &[ToolParameter {
            name: "path",
            description: "The path of the folder to view",
            required: true,
        }],
    },
    ToolDescriptor {
        name: GENERATE_SUMMARY,
        description: "Generate a summary of the given content",
        parameters: &[ToolParameter {
            name: "content",
            description: "The content to summarize",
            required: true,
        }],
    },
];

impl ToolDescriptor {
    /// JSON Schema object for the parameters.
    pub fn schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({"type": "string", "description": p.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.to_string(),
                description: self.description.to_string(),
                parameters: self.schema(),
            },
        }
    }
}

/// Wire-format definitions of the whole catalog.
pub fn tool_definitions() -> &'static [ToolDefinition] {
    static DEFINITIONS: OnceLock<Vec<ToolDefinition>> = OnceLock::new();
    DEFINITIONS.get_or_init(|| TOOL_CATALOG.iter().map(ToolDescriptor::to_definition).collect())
}

/// Look up a descriptor by tool name.
pub fn find(name: &str) -> Option<&'static ToolDescriptor> {
    TOOL_CATALOG.iter().find(|t| t.name == name)
}
