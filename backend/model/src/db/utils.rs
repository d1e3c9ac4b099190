//! Database schema maintenance things.

use std::{
	fmt::Display,
	ops::{Deref, DerefMut},
};

use diesel::{
	AppearsOnTable, Expression,
	deserialize::{self, FromSql, FromSqlRow},
	expression::{AsExpression, NonAggregate},
	pg::{Pg, PgValue},
	query_builder::{QueryFragment, QueryId},
	serialize::{self, IsNull, Output, ToSql},
	sql_types::{Binary, Bool, Jsonb, SqlType, VarChar},
	sqlite::{Sqlite, SqliteValue},
};
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

/// Current wall-clock time in the representation used for timestamp columns.
pub fn sql_now() -> PrimitiveDateTime {
	let now = OffsetDateTime::now_utc();
	PrimitiveDateTime::new(now.date(), now.time())
}

/// UUID column usable on both backends: `UUID` on PostgreSQL,
/// 16-byte `BLOB` on SQLite.
#[derive(Debug, Clone, Copy, Default, QueryId, SqlType)]
#[diesel(postgres_type(oid = 2950, array_oid = 2951))]
#[diesel(sqlite_type(name = "Binary"))]
pub struct DbUuid;

#[derive(Debug, AsExpression, FromSqlRow, Clone, Copy, PartialEq, Eq)]
#[diesel(sql_type = DbUuid)]
pub struct DbUuidVal(pub Uuid);

impl Deref for DbUuidVal {
	type Target = Uuid;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for DbUuidVal {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl AsRef<Uuid> for DbUuidVal {
	fn as_ref(&self) -> &Uuid {
		&self.0
	}
}

impl From<Uuid> for DbUuidVal {
	fn from(value: Uuid) -> Self {
		Self(value)
	}
}

impl FromSql<DbUuid, Pg> for DbUuidVal {
	fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
		Ok(DbUuidVal(Uuid::from_slice(value.as_bytes())?))
	}
}

impl ToSql<DbUuid, Pg> for DbUuidVal {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
		<Uuid as ToSql<diesel::sql_types::Uuid, Pg>>::to_sql(self, out)
	}
}

impl FromSql<DbUuid, Sqlite> for DbUuidVal {
	fn from_sql(value: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
		let value = <Vec<u8> as FromSql<Binary, Sqlite>>::from_sql(value)?;
		Ok(DbUuidVal(Uuid::from_slice(value.as_slice())?))
	}
}

impl ToSql<DbUuid, Sqlite> for DbUuidVal {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
		<[u8; 16] as ToSql<Binary, Sqlite>>::to_sql(self.as_bytes(), out)
	}
}

impl Display for DbUuidVal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

/// JSON column usable on both backends: `JSONB` on PostgreSQL,
/// serialized `TEXT` on SQLite.
#[derive(Debug, Clone, Copy, Default, QueryId, SqlType)]
#[diesel(postgres_type(oid = 3802, array_oid = 3807))]
#[diesel(sqlite_type(name = "Text"))]
pub struct DbJson;

#[derive(Debug, AsExpression, FromSqlRow, Clone, PartialEq, Eq)]
#[diesel(sql_type = DbJson)]
pub struct DbJsonVal(pub serde_json::Value);

impl Deref for DbJsonVal {
	type Target = serde_json::Value;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for DbJsonVal {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl AsRef<serde_json::Value> for DbJsonVal {
	fn as_ref(&self) -> &serde_json::Value {
		&self.0
	}
}

impl From<serde_json::Value> for DbJsonVal {
	fn from(value: serde_json::Value) -> Self {
		Self(value)
	}
}

impl DbJsonVal {
	/// Decodes a JSON array column into a list of strings,
	/// skipping non-string elements.
	pub fn into_string_list(self) -> Vec<String> {
		match self.0 {
			serde_json::Value::Array(items) => items
				.into_iter()
				.filter_map(|item| match item {
					serde_json::Value::String(s) => Some(s),
					_ => None,
				})
				.collect(),
			_ => Vec::new(),
		}
	}

	/// Encodes a list of strings as a JSON array column value.
	pub fn from_string_list<S: AsRef<str>>(items: &[S]) -> Self {
		Self(serde_json::Value::Array(
			items
				.iter()
				.map(|item| serde_json::Value::String(item.as_ref().to_string()))
				.collect(),
		))
	}
}

impl FromSql<DbJson, Pg> for DbJsonVal {
	fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
		Ok(DbJsonVal(
			<serde_json::Value as FromSql<Jsonb, Pg>>::from_sql(value)?,
		))
	}
}

impl ToSql<DbJson, Pg> for DbJsonVal {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
		<serde_json::Value as ToSql<Jsonb, Pg>>::to_sql(self, out)
	}
}

impl FromSql<DbJson, Sqlite> for DbJsonVal {
	fn from_sql(value: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
		let value = <String as FromSql<VarChar, Sqlite>>::from_sql(value)?;
		let value = serde_json::from_str(&value)?;
		Ok(DbJsonVal(value))
	}
}

impl ToSql<DbJson, Sqlite> for DbJsonVal {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
		out.set_value(serde_json::to_string(self.as_ref())?);
		Ok(IsNull::No)
	}
}

impl Display for DbJsonVal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

/// A boolean filter expression valid on both SQL backends.
pub trait WherePredicate<T>
where
	Self: Send + AppearsOnTable<T> + QueryId,
	Self: QueryFragment<Pg> + QueryFragment<Sqlite>,
	Self: Expression<SqlType = Bool> + NonAggregate,
{
}

impl<T, V> WherePredicate<V> for T
where
	Self: Send + AppearsOnTable<V> + QueryId,
	Self: QueryFragment<Pg> + QueryFragment<Sqlite>,
	Self: Expression<SqlType = Bool> + NonAggregate,
{
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_string_list_round_trip() {
		let val = DbJsonVal::from_string_list(&["src/a.rs", "src/b.rs"]);
		assert_eq!(
			val.clone().into_string_list(),
			vec!["src/a.rs".to_string(), "src/b.rs".to_string()]
		);
		assert_eq!(val.to_string(), r#"["src/a.rs","src/b.rs"]"#);
	}

	#[test]
	fn test_string_list_skips_non_strings() {
		let val = DbJsonVal(serde_json::json!(["keep", 1, null, {"a": 2}]));
		assert_eq!(val.into_string_list(), vec!["keep".to_string()]);
	}
}
