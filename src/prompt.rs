//! Itinerary prompt assembly
//!
//! Renders the collected trip details and interview answers into the single
//! instruction string sent to the model. Output is fully determined by the
//! response map: no randomness, no content-dependent branches.

use crate::state_machine::ResponseMap;

/// Opening line of every itinerary request
const PREAMBLE: &str = "Create a detailed travel itinerary with:";

/// Fixed requirements appended after the collected responses
const INSTRUCTIONS: &[&str] = &[
    "I want the following things to be included in the itinerary:",
    "Include for each day:",
    "- Morning, Afternoon, and Evening activities",
    "- 2-3 dining options with dietary accommodations",
    "- Transportation options between locations",
    "- Cost estimates for each activity mentioned above",
    "- Local insider tips and hidden gems",
    "",
    "Structure this itinerary:",
    "1. Group nearby attractions to minimize travel time",
    "2. Balance popular spots with unique local experiences",
    "3. Include time buffers for meals and transit",
    "4. Add safety tips and cultural notes",
    "5. Format with clear daily headings and emojis",
    "6. Give me answer only in english",
];

/// Build the itinerary request from the response map.
///
/// One `key: value` line per entry, in insertion order, between the preamble
/// and the fixed instruction block. Lines are `\n`-separated with no trailing
/// newline.
pub fn assemble_prompt(responses: &ResponseMap) -> String {
    let lines = std::iter::once(PREAMBLE.to_string())
        .chain(responses.iter().map(|(key, value)| format!("{key}: {value}")))
        .chain(INSTRUCTIONS.iter().map(|line| (*line).to_string()));

    lines.collect::<Vec<_>>().join("\n")
}
