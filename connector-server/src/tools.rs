// Connector tool schemas
//
// The launch schema embeds the connectors' own parameter set so clients see
// the same names, types and defaults the model binds against

use crate::protocol::Tool;
use connector_model::ConnectorContainer;
use serde_json::json;

pub fn get_tools(container: &ConnectorContainer) -> Vec<Tool> {
    let connector_names: Vec<&str> = container.connectors().iter().map(|c| c.name()).collect();
    let launch_arguments = container
        .connectors()
        .first()
        .map(|c| c.parameters().to_schema())
        .unwrap_or_else(|| json!({"type": "object"}));

    let connector_property = json!({
        "type": "string",
        "description": "Connector name (optional, uses the default connector if omitted)",
        "enum": connector_names,
    });

    vec![
        Tool {
            name: "connectors.list".to_string(),
            description: "List connectors with their launch state and the current default".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "connectors.parameters".to_string(),
            description: "Describe the launch parameters of a connector".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connector": connector_property
                }
            }),
        },
        Tool {
            name: "connectors.launch".to_string(),
            description: "Connect to a remote debug stub through a connector".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connector": connector_property,
                    "arguments": launch_arguments
                },
                "required": ["arguments"]
            }),
        },
        Tool {
            name: "connectors.set_active".to_string(),
            description: "Make a connector the default".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "connector": {
                        "type": "string",
                        "description": "Connector name",
                        "enum": connector_names
                    }
                },
                "required": ["connector"]
            }),
        },
        Tool {
            name: "sessions.list".to_string(),
            description: "List sessions established by successful launches".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: "sessions.close".to_string(),
            description: "Drop an established session".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Session ID from sessions.list"
                    }
                },
                "required": ["session_id"]
            }),
        },
    ]
}
