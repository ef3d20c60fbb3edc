const EXTRACTION_RULES: &str = r#"1. Extract ONLY the fighters that the host picked as WINNERS for each fight on the card. Do not include both fighters from a matchup.
2. Important rules for extraction:
      - For each fight matchup, only include the predicted WINNER
      - If the host is unsure or doesn't make a clear pick, skip that fight completely
      - Do not list both fighters from the same matchup
      - Double-check the picks against the picks recap segment at the end if available
3. What was the event name mentioned (for example "UFC 300" or "UFC Fight Night: Adesanya vs. Imavov")?

Format your response strictly as a JSON object with the following structure and nothing else:
{
    "fighters": ["Fighter1", "Fighter2"],
    "event_name": "UFC XXX"
}
The "fighters" field may also be an object keyed by position, e.g. {"1": "Fighter1", "2": "Fighter2"}.

Notes:
      - Use null if you can't find the event name
      - Only include clear, definitive picks"#;

/// Builds the extraction prompt: the transcript verbatim, then the rules.
pub fn build_prompt(transcript: &str, title: Option<&str>) -> String {
    let header = match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!(
            "Analyze this fight podcast transcript titled '{title}' and extract the following information:"
        ),
        None => "Analyze this fight podcast transcript and extract the following information:"
            .to_string(),
    };

    let mut prompt = String::with_capacity(transcript.len() + EXTRACTION_RULES.len() + 128);
    prompt.push_str(transcript);
    prompt.push_str("\n\n");
    prompt.push_str(&header);
    prompt.push('\n');
    prompt.push_str(EXTRACTION_RULES);
    prompt.push('\n');
    prompt
}
