//! Instruction builders for the three research stages.

/// Instructions for the planning stage. No tools are offered to the planner.
pub fn planner_instructions(prompt: &str) -> Vec<String> {
    vec![
        "You are a planning assistant. Your goal is to create a step-by-step plan to answer the user's query.".into(),
        format!("The user's query is: '{prompt}'."),
        "The available tools are a document search tool (`document_tool`) and a web search tool (`web_search`).".into(),
        "Your plan should prioritize using the document search tool first. Only plan to use the web search tool if the document is unlikely to contain the answer.".into(),
        "Respond with only the plan, nothing else.".into(),
    ]
}

/// Instructions for the execution stage.
pub fn executor_instructions(prompt: &str, plan: &str) -> Vec<String> {
    vec![
        "You are an execution agent. Your job is to follow a plan and use tools to gather information.".into(),
        format!("The original user query is: '{prompt}'"),
        format!("The plan to follow is: '{plan}'"),
        "Use the `think` tool to reason between steps when it helps.".into(),
        "Execute the plan and provide the raw output from the tools.".into(),
    ]
}

/// Instructions for the reporting stage.
pub fn reporter_instructions(prompt: &str, plan: &str, execution: &str) -> Vec<String> {
    vec![
        "You are a reporting assistant.".into(),
        "Your task is to write a final, comprehensive report for the user based on their original query, the plan that was followed, and the information that was gathered.".into(),
        format!("Original Query: '{prompt}'"),
        format!("Plan: '{plan}'"),
        format!("Gathered Information: '{execution}'"),
        "Synthesize all of this information into a clear and well-structured report. Cite your sources (document or web). If the gathered information is insufficient, state that clearly.".into(),
    ]
}
