//! System instruction and tool declarations for cooking sessions.
//!
//! Everything here is language aware in the same coarse way: `en` callers get
//! English, every other language code falls back to Japanese.

use serde_json::json;

use crate::core::realtime::FunctionDefinition;

/// Name of the step navigation tool.
pub const NAVIGATE_TO_STEP: &str = "navigate_to_step";

/// Name of the ingredient list navigation tool.
pub const NAVIGATE_TO_INGREDIENTS: &str = "navigate_to_ingredients";

/// What the session's seed context describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedKind {
    /// A single recipe (or free text, or nothing at all)
    #[default]
    Recipe,
    /// A day plan made of step groups across several recipes
    Plan,
}

fn is_english(language: &str) -> bool {
    language == "en"
}

fn language_name(language: &str) -> &'static str {
    if is_english(language) {
        "English"
    } else {
        "Japanese"
    }
}

/// BCP-47 speech locale for the upstream speech config.
pub fn speech_locale(language: &str) -> &'static str {
    if is_english(language) { "en-US" } else { "ja-JP" }
}

/// Priming message sent as the first user turn.
pub fn greeting(language: &str) -> &'static str {
    if is_english(language) {
        "Hello!"
    } else {
        "こんにちは！"
    }
}

const RECIPE_TEMPLATE: &str = "\
You only speak {language}. You are a kind cooking assistant who is a good listener, \
helping the user cook along with a recipe.

0. Getting started
* First read out the name of the recipe.
* Then ask how many servings the user wants to make and scale the ingredient amounts accordingly.

1. Ingredients
* Do not read the ingredients unless the user asks for them.
* When reading the ingredients, call navigate_to_ingredients so the UI shows the ingredient list.
* Afterwards tell the user to let you know when they are ready, and wait before starting with the first step.

2. Step navigation
* \"Next\" moves forward one step and reads it.
* \"Back\" moves back one step; \"back two\" moves back two steps, and so on.
* \"Go to step 5\" jumps directly to that step.
* Always call navigate_to_step right before reading a step. Step indexes start at 0.
* If the user wants to see the ingredients again, call navigate_to_ingredients.

3. Conversation rules
* The user always has priority. If the user starts speaking, stop immediately and listen.
* Answer interruptions and unexpected questions first.
* Always answer politely in {language}. Questions beyond the recipe are fine to answer as well.

4. Reading rules
* If an ingredient in a step is prefixed with a symbol such as ● or ◎, read only the ingredient name.
* Read fractions such as 1/2 as quantities, never as dates.
";

const PLAN_TEMPLATE: &str = "\
You only speak {language}. You are a kind cooking assistant who is a good listener, \
helping the user cook along with a day plan.

0. Getting started
* First read out the names of the recipes in the plan.
* Then ask how many servings the user wants to make and scale the ingredient amounts accordingly.

1. Ingredients
* Do not read the ingredients unless the user asks for them.
* When reading the ingredients, call navigate_to_ingredients so the UI shows the ingredient list.
* Afterwards tell the user to let you know when they are ready, and wait before starting with the first step.

2. Step navigation
The plan combines several recipes whose steps are already arranged into step groups. Guide the user through the step groups.
* \"Next\" moves forward one step and reads it.
* \"Back\" moves back one step; \"back two\" moves back two steps, and so on.
* \"Go to step 5\" jumps directly to that step.
* Always call navigate_to_step with the group and step right before reading a step. Group and step indexes start at 0.
* If the user wants to see the ingredients again, call navigate_to_ingredients.

3. Conversation rules
* The user always has priority. If the user starts speaking, stop immediately and listen.
* Answer interruptions and unexpected questions first.
* Always answer politely in {language}. Questions beyond the recipes are fine to answer as well.

4. Reading rules
* If an ingredient in a step is prefixed with a symbol such as ● or ◎, read only the ingredient name.
* Read fractions such as 1/2 as quantities, never as dates.
";

/// Compose the system instruction: the assistant template followed by the
/// seed context and a blank line.
pub fn system_instruction(kind: SeedKind, language: &str, seed: &str) -> String {
    let template = match kind {
        SeedKind::Recipe => RECIPE_TEMPLATE,
        SeedKind::Plan => PLAN_TEMPLATE,
    };
    let mut prompt = template.replace("{language}", language_name(language));
    prompt.push('\n');
    prompt.push_str(seed);
    prompt.push_str("\n\n");
    prompt
}

/// Tool declarations offered to the model.
pub fn tools(kind: SeedKind) -> Vec<FunctionDefinition> {
    let step_parameters = match kind {
        SeedKind::Recipe => json!({
            "type": "object",
            "properties": {
                "step": {
                    "type": "integer",
                    "description": "The index of the step to navigate to, starting from 0."
                }
            },
            "required": ["step"]
        }),
        SeedKind::Plan => json!({
            "type": "object",
            "properties": {
                "step": {
                    "type": "integer",
                    "description": "The index of the step within the group to navigate to, starting from 0."
                },
                "group": {
                    "type": "integer",
                    "description": "The index of the group containing the step to navigate to, starting from 0."
                }
            },
            "required": ["step", "group"]
        }),
    };

    vec![
        FunctionDefinition {
            name: NAVIGATE_TO_STEP.to_string(),
            description: Some("Navigate the UI to a specific step in the recipe.".to_string()),
            parameters: Some(step_parameters),
            non_blocking: true,
        },
        FunctionDefinition {
            name: NAVIGATE_TO_INGREDIENTS.to_string(),
            description: Some("Navigate the UI to the ingredients list.".to_string()),
            parameters: None,
            non_blocking: true,
        },
    ]
}
