diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	users (id) {
		id -> DbUuid,
		/// GitHub account ID, as delivered by the OAuth profile.
		///
		/// This should not change after user insertion.
		github_id -> VarChar,
		username -> VarChar,
		email -> Nullable<VarChar>,
		avatar_url -> Nullable<VarChar>,
		/// OAuth access token used for user-scoped GitHub API calls.
		access_token -> Nullable<VarChar>,
		created_at -> Timestamp,
		updated_at -> Timestamp,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	/// Table for connected repositories.
	repository (id) {
		id -> DbUuid,
		/// GitHub numeric repository ID.
		github_id -> BigInt,
		name -> VarChar,
		full_name -> VarChar,
		owner -> VarChar,
		private -> Bool,
		default_branch -> VarChar,
		language -> Nullable<VarChar>,
		/// GitHub App installation this repository is reachable through.
		installation_id -> Nullable<BigInt>,
		user_id -> Nullable<DbUuid>,
		enabled -> Bool,
		auto_generate_tests -> Bool,
		only_changed_files -> Bool,
		max_prs_per_day -> Int4,
		/// JSON array of protected path prefixes.
		protected_dirs -> DbJson,
		created_at -> Timestamp,
		updated_at -> Timestamp,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	/// Table for GitHub App installations.
	///
	/// The primary key is the installation ID assigned by GitHub.
	installation (id) {
		id -> BigInt,
		account_id -> VarChar,
		account_type -> VarChar,
		account_login -> VarChar,
		user_id -> Nullable<DbUuid>,
		created_at -> Timestamp,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	/// Table for tracked pull requests.
	///
	/// (repository, pr_number) is unique.
	pull_request (id) {
		id -> DbUuid,
		repository -> DbUuid,
		pr_number -> Int4,
		title -> VarChar,
		state -> VarChar,
		head_sha -> VarChar,
		base_sha -> VarChar,
		author -> VarChar,
		/// JSON array of changed file paths.
		changed_files -> DbJson,
		additions -> Int4,
		deletions -> Int4,
		analysis_status -> Int2,
		has_tests -> Nullable<Bool>,
		risk_level -> Nullable<Int2>,
		suggestions -> Nullable<DbJson>,
		/// ID of the review comment Hiro left on this PR.
		comment_id -> Nullable<BigInt>,
		analyzed_at -> Nullable<Timestamp>,
		created_at -> Timestamp,
		updated_at -> Timestamp,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	/// Table for test generation jobs.
	test_job (id) {
		/// Unique identifier of this job.
		///
		/// The ID must be a UUID v7, of which the timestamp is the time
		/// when the job was created, so ordering by ID is equivalent to
		/// ordering by creation time.
		id -> DbUuid,
		repository -> DbUuid,
		pull_request -> Nullable<DbUuid>,
		kind -> Int2,
		status -> Int2,
		/// JSON array of file paths this job should generate tests for.
		target_files -> DbJson,
		/// Percentage of target files already processed, 0..=100.
		progress -> Int2,
		error_message -> Nullable<VarChar>,
		metadata -> Nullable<DbJson>,
		created_at -> Timestamp,
		/// Set when and only when the job has been claimed by a runner.
		started_at -> Nullable<Timestamp>,
		completed_at -> Nullable<Timestamp>,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	/// Table for generated test files, one row per (job, source file).
	test_result (id) {
		id -> DbUuid,
		job -> DbUuid,
		repository -> DbUuid,
		file_path -> VarChar,
		test_file_path -> VarChar,
		test_code -> Text,
		/// Markdown notes on how to run the generated tests.
		metadata -> Text,
		/// JSON array of package names the tests depend on.
		required_packages -> DbJson,
		test_framework -> Nullable<VarChar>,
		coverage -> Nullable<Double>,
		created_at -> Timestamp,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	coverage_snapshot (id) {
		id -> DbUuid,
		repository -> DbUuid,
		overall_coverage -> Double,
		/// JSON object mapping file path to coverage percentage.
		file_coverage -> DbJson,
		total_files -> Int4,
		tested_files -> Int4,
		created_at -> Timestamp,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	/// Append-only activity log surfaced on the dashboard.
	action_feed (id) {
		id -> DbUuid,
		repository -> DbUuid,
		kind -> Int2,
		title -> VarChar,
		description -> Nullable<VarChar>,
		pr_number -> Nullable<Int4>,
		pr_url -> Nullable<VarChar>,
		risk_level -> Nullable<Int2>,
		coverage_impact -> Nullable<Double>,
		metadata -> Nullable<DbJson>,
		created_at -> Timestamp,
	}
}
