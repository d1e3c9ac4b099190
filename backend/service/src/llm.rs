//! Chat-completions client for LLM-backed test generation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "\
You are an expert unit test generation assistant. Your task is to:
1. Analyze the provided code context and identify key functionality to test
2. Generate up to 3 high-quality unit test cases per file that cover:
   - Core functionality
   - Edge cases
   - Error handling
3. Follow testing best practices:
   - Use appropriate testing framework (e.g., Jest, PyTest, JUnit)
   - Follow AAA pattern (Arrange, Act, Assert)
   - Keep tests focused and isolated
   - Use meaningful test descriptions

Requirements:
- Generate no more than 3 test cases per file
- Include necessary test framework imports
- Add clear test descriptions
- Mock external dependencies
- Handle async code appropriately
- Consider test maintainability

Provided below is the file tree of the repository. Use it to identify which files need testing and generate appropriate test cases.";

const DEFAULT_USER_PROMPT: &str = "Generate a test function for this file";

/// Hard caps so large repositories stay within the model's token limit.
const MAX_CONTEXT_LEN: usize = 4000;
const MAX_TREE_LEN: usize = 1000;

/// Configuration for [`LlmService`].
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LlmConfig {
	pub api_key: String,
	/// OpenAI-compatible chat completions base URL.
	#[serde(default = "default_base_url")]
	pub base_url: String,
	#[serde(default = "default_model")]
	pub model: String,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
}

fn default_base_url() -> String {
	"https://api.groq.com/openai/v1".into()
}

fn default_model() -> String {
	"llama-3.3-70b-versatile".into()
}

fn default_max_tokens() -> u32 {
	4000
}

#[derive(Debug, Error)]
pub enum LlmError {
	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("llm api returned {status}: {message}")]
	Api { status: u16, message: String },
	#[error("empty completion from llm")]
	EmptyResponse,
	#[error("malformed completion from llm: {0}")]
	InvalidResponse(#[from] serde_json::Error),
}

/// Everything the prompt builder needs for one file.
#[derive(Debug, Clone, Copy)]
pub struct TestGenerationRequest<'a> {
	pub file_tree: &'a str,
	pub repo_context: &'a str,
	pub code: &'a str,
	pub user_prompt: Option<&'a str>,
}

/// Parsed and validated test generation completion.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GeneratedTests {
	/// The generated test source code.
	pub code: String,
	/// Markdown notes on how to run the tests.
	pub metadata: String,
	/// Package names the tests depend on, without versions.
	pub packages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAnalysis {
	pub needs_tests: bool,
	#[serde(default)]
	pub test_framework: Option<String>,
	#[serde(default)]
	pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
	content: Option<String>,
}

pub struct LlmService {
	config: LlmConfig,
	http: reqwest::Client,
}

impl std::fmt::Debug for LlmService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LlmService")
			.field("model", &self.config.model)
			.finish()
	}
}

impl LlmService {
	pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
		let http = reqwest::Client::builder().build()?;
		Ok(Self { config, http })
	}

	async fn chat(
		&self,
		messages: serde_json::Value,
		temperature: f32,
	) -> Result<String, LlmError> {
		let response = self
			.http
			.post(format!("{}/chat/completions", self.config.base_url))
			.bearer_auth(&self.config.api_key)
			.json(&serde_json::json!({
				"model": self.config.model,
				"messages": messages,
				"temperature": temperature,
				"max_tokens": self.config.max_tokens,
				"response_format": { "type": "json_object" },
			}))
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			let message = message.chars().take(256).collect();
			return Err(LlmError::Api {
				status: status.as_u16(),
				message,
			});
		}

		let completion: ChatCompletion = response.json().await?;
		completion
			.choices
			.into_iter()
			.next()
			.and_then(|choice| choice.message.content)
			.filter(|content| !content.is_empty())
			.ok_or(LlmError::EmptyResponse)
	}

	/// Generates unit tests for a single file.
	pub async fn generate_tests(
		&self,
		request: TestGenerationRequest<'_>,
	) -> Result<GeneratedTests, LlmError> {
		let prompt = build_generation_prompt(request);
		debug!(prompt_len = prompt.len(), model = %self.config.model, "requesting test generation");

		let content = self
			.chat(
				serde_json::json!([
					{ "role": "system", "content": SYSTEM_PROMPT },
					{ "role": "user", "content": prompt },
				]),
				0.9,
			)
			.await?;
		parse_generated_tests(&content)
	}

	/// Quick triage of whether a file needs tests at all.
	///
	/// Falls back to "needs tests" when the model response is unusable,
	/// so triage never blocks generation.
	pub async fn analyze_code(&self, code: &str, context: Option<&str>) -> CodeAnalysis {
		let prompt = build_analysis_prompt(code, context);
		let result = self
			.chat(
				serde_json::json!([{ "role": "user", "content": prompt }]),
				0.7,
			)
			.await;
		match result.and_then(|content| Ok(serde_json::from_str(&content)?)) {
			Ok(analysis) => analysis,
			Err(error) => {
				warn!(%error, "code analysis failed, assuming tests are needed");
				CodeAnalysis {
					needs_tests: true,
					test_framework: None,
					suggestions: Vec::new(),
				}
			}
		}
	}
}

fn truncate_at(text: &str, limit: usize, marker: &str) -> String {
	if text.len() <= limit {
		return text.to_owned();
	}
	// Back off to a char boundary so we never split a code point.
	let mut end = limit;
	while !text.is_char_boundary(end) {
		end -= 1;
	}
	format!("{}...\n[{} truncated due to size limits]", &text[..end], marker)
}

fn build_generation_prompt(request: TestGenerationRequest<'_>) -> String {
	let tree = truncate_at(request.file_tree, MAX_TREE_LEN, "File tree");
	let context = truncate_at(request.repo_context, MAX_CONTEXT_LEN, "Context");
	let user_prompt = request.user_prompt.unwrap_or(DEFAULT_USER_PROMPT);

	format!(
		r###"{SYSTEM_PROMPT}

File Tree:
{tree}

Repository Context:
{context}

Code to Test:
{code}

Request: {user_prompt}

Please respond with a JSON object containing:
- "code": The generated test code (only code, no additional text)
- "metadata": Additional information needed to run the unit tests (in markdown format)
- "packages": Array of required package names (package names only, no versions)

Example response format:
{{
  "code": "describe('MyFunction', () => {{ ... }})",
  "metadata": "## Test Description\n\nThis test suite covers...",
  "packages": ["jest", "@testing-library/react"]
}}"###,
		code = request.code,
	)
}

fn build_analysis_prompt(code: &str, context: Option<&str>) -> String {
	let context = context
		.map(|context| format!("Context: {}", context))
		.unwrap_or_default();
	format!(
		r#"Analyze the following code and determine:
1. Does it need unit tests? (yes/no)
2. What testing framework should be used?
3. What are the key functions/methods that need testing?

Code:
{code}

{context}

Respond with JSON:
{{
  "needsTests": true/false,
  "testFramework": "jest" | "pytest" | "junit" | etc,
  "suggestions": ["function1", "function2", ...]
}}"#,
	)
}

fn parse_generated_tests(content: &str) -> Result<GeneratedTests, LlmError> {
	let tests: GeneratedTests = serde_json::from_str(content)?;
	if tests.code.is_empty() || tests.metadata.is_empty() {
		return Err(LlmError::EmptyResponse);
	}
	Ok(tests)
}

#[cfg(test)]
mod test {
	use super::{
		GeneratedTests, MAX_TREE_LEN, TestGenerationRequest, build_generation_prompt,
		parse_generated_tests, truncate_at,
	};

	#[test]
	fn test_truncation() {
		assert_eq!(truncate_at("short", 100, "Context"), "short");
		let long = "x".repeat(5000);
		let truncated = truncate_at(&long, 4000, "Context");
		assert!(truncated.starts_with(&"x".repeat(4000)));
		assert!(truncated.ends_with("[Context truncated due to size limits]"));
	}

	#[test]
	fn test_truncation_respects_char_boundaries() {
		let text = "é".repeat(10);
		let truncated = truncate_at(&text, 5, "Context");
		assert!(truncated.starts_with("éé"));
	}

	#[test]
	fn test_prompt_includes_all_sections() {
		let tree = "src/\n  main.ts";
		let prompt = build_generation_prompt(TestGenerationRequest {
			file_tree: tree,
			repo_context: "=== File: main.ts ===",
			code: "export function add(a, b) { return a + b }",
			user_prompt: None,
		});
		assert!(prompt.contains("File Tree:\nsrc/"));
		assert!(prompt.contains("Code to Test:\nexport function add"));
		assert!(prompt.contains("Request: Generate a test function for this file"));
	}

	#[test]
	fn test_prompt_truncates_large_tree() {
		let tree = "a".repeat(MAX_TREE_LEN + 1);
		let prompt = build_generation_prompt(TestGenerationRequest {
			file_tree: &tree,
			repo_context: "",
			code: "",
			user_prompt: Some("custom"),
		});
		assert!(prompt.contains("[File tree truncated due to size limits]"));
		assert!(prompt.contains("Request: custom"));
	}

	#[test]
	fn test_parse_generated_tests() {
		let parsed = parse_generated_tests(
			r###"{"code": "describe('x', () => {})", "metadata": "## Notes", "packages": ["jest"]}"###,
		)
		.unwrap();
		assert_eq!(
			parsed,
			GeneratedTests {
				code: "describe('x', () => {})".into(),
				metadata: "## Notes".into(),
				packages: vec!["jest".into()],
			}
		);
	}

	#[test]
	fn test_parse_rejects_missing_fields() {
		assert!(parse_generated_tests(r#"{"code": "x"}"#).is_err());
		assert!(parse_generated_tests(r#"{"code": "", "metadata": "m", "packages": []}"#).is_err());
		assert!(parse_generated_tests("not json").is_err());
	}
}
