use bongchun_llm::{FunctionDeclaration, schema};
use bongchun_mcp::CapabilityCatalog;

/// Translate every catalog tool into a Gemini function declaration.
///
/// Tools whose input schema cannot be translated are declared without
/// parameters.
#[must_use]
pub fn declarations(catalog: &CapabilityCatalog) -> Vec<FunctionDeclaration> {
    catalog
        .all_tools()
        .map(|tool| FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: schema::clean(&tool.input_schema, &tool.name),
        })
        .collect()
}

/// Shorten `text` for a log line. Payloads sent to the model are never cut.
#[must_use]
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
