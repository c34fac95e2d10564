//! The `masterytrace init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create masterytrace.toml
    if std::path::Path::new("masterytrace.toml").exists() {
        println!("masterytrace.toml already exists, skipping.");
    } else {
        std::fs::write("masterytrace.toml", SAMPLE_CONFIG)?;
        println!("Created masterytrace.toml");
    }

    // Create example catalog and session
    std::fs::create_dir_all("catalogs")?;
    std::fs::create_dir_all("sessions")?;
    for (path, content) in [
        ("catalogs/example.toml", EXAMPLE_CATALOG),
        ("sessions/example.toml", EXAMPLE_SESSION),
    ] {
        if std::path::Path::new(path).exists() {
            println!("{path} already exists, skipping.");
        } else {
            std::fs::write(path, content)?;
            println!("Created {path}");
        }
    }

    println!("\nNext steps:");
    println!("  1. Run: masterytrace validate --catalog catalogs/example.toml");
    println!("  2. Run: masterytrace params --catalog catalogs/example.toml");
    println!(
        "  3. Run: masterytrace replay --catalog catalogs/example.toml \
         --session sessions/example.toml --state state.json"
    );

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# masterytrace configuration

# An attempt counts as a correct observation when its score is above this.
pass_threshold = 0.7
# p_know at or above which a skill is reported as mastered.
mastered_threshold = 0.95
# "per_attempt" folds one observation per submitted attempt,
# "per_question" one per graded response.
granularity = "per_attempt"
output_dir = "./masterytrace-results"

[defaults]
p_transit = 0.1
p_slip = 0.1
p_guess = 0.25

# Short-answer grading: "manual" (default), "exact", or "fuzzy".
[short_answer]
type = "manual"
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example Catalog"
description = "A small catalog to get started"

[[skills]]
id = "arrays"
name = "Arrays"
description = "Indexing and traversal"

[[skills]]
id = "search"
name = "Searching"
description = "Linear and binary search"
prerequisites = [{ skill = "arrays" }]
[skills.params]
p_guess = 0.2

[[quizzes]]
id = "arrays-basics"
title = "Array basics"
skill = "arrays"

[[quizzes.questions]]
id = 1
kind = "mcq"
prompt = "What is the cost of reading arr[i]?"

[[quizzes.questions.options]]
id = 11
text = "O(1)"
correct = true

[[quizzes.questions.options]]
id = 12
text = "O(n)"

[[quizzes.questions]]
id = 2
kind = "mcq"
prompt = "Which index holds the first element?"

[[quizzes.questions.options]]
id = 21
text = "0"
correct = true

[[quizzes.questions.options]]
id = 22
text = "1"

[[quizzes]]
id = "search-basics"
title = "Searching"
skill = "search"

[[quizzes.questions]]
id = 3
kind = "short_answer"
prompt = "Which search halves the range on every step?"
accepted_answers = ["binary search"]
"#;

const EXAMPLE_SESSION: &str = r#"[[attempts]]
user = "alice"
quiz = "arrays-basics"

[[attempts.responses]]
question = 1
answer = "11"

[[attempts.responses]]
question = 2
answer = "21"

[[attempts]]
user = "bob"
quiz = "arrays-basics"

[[attempts.responses]]
question = 1
answer = "12"
"#;
