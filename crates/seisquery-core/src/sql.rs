//! SQL rendering of a compiled [`EventQuery`].
//!
//! This is the relational store adapter's half of the compiler: it renders
//! the structured query against the classic catalog schema (one table per
//! entity, a shared `PublicObject` table mapping `_oid` to public IDs, child
//! rows linked through `_parent_oid`). Physical column names differ between
//! database backends, so every column goes through a [`ColumnNames`]
//! translator.

use crate::query::{CmpOp, EventQuery, Field, MagnitudeSource, Predicate, SortKey, Value};

// ---------------------------------------------------------------------------
// Schema name translation
// ---------------------------------------------------------------------------

/// Maps a logical column name to the backend's physical name.
pub trait ColumnNames {
    fn column(&self, logical: &str) -> String;
}

/// Physical name equals logical name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainColumns;

impl ColumnNames for PlainColumns {
    fn column(&self, logical: &str) -> String {
        logical.to_string()
    }
}

/// Every column carries a fixed prefix, e.g. `m_publicID`.
#[derive(Debug, Clone)]
pub struct PrefixedColumns {
    pub prefix: String,
}

impl ColumnNames for PrefixedColumns {
    fn column(&self, logical: &str) -> String {
        format!("{}{logical}", self.prefix)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render `query` as one SQL statement returning event rows in final order.
pub fn render(query: &EventQuery, names: &dyn ColumnNames) -> String {
    let r = Renderer { names };
    let branches: Vec<String> = query
        .branches
        .iter()
        .map(|source| r.branch(query, *source))
        .collect();

    let mut sql = branches.join(" UNION ");
    sql.push_str(" ORDER BY colOrderBy ");
    sql.push_str(if query.order.ascending { "ASC" } else { "DESC" });

    if let Some(circle) = &query.distance {
        let mut bounds = Vec::new();
        if let Some(min) = circle.min_radius {
            bounds.push(format!("distance >= {}", float(min)));
        }
        if let Some(max) = circle.max_radius {
            bounds.push(format!("distance <= {}", float(max)));
        }
        sql = format!("SELECT * FROM ({sql}) AS subquery");
        if !bounds.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&bounds.join(" AND "));
        }
    }

    if let Some(page) = &query.page {
        sql.push_str(&format!(" LIMIT {}", page.limit));
        if page.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", page.offset));
        }
    }
    sql
}

struct Renderer<'a> {
    names: &'a dyn ColumnNames,
}

impl Renderer<'_> {
    fn col(&self, logical: &str) -> String {
        self.names.column(logical)
    }

    fn branch(&self, query: &EventQuery, source: MagnitudeSource) -> String {
        let pid = self.col("publicID");
        let order_col = match query.order.key {
            SortKey::OriginTime => format!("o.{}", self.col("time_value")),
            SortKey::MagnitudeValue => format!("m.{}", self.col("magnitude_value")),
        };

        // SELECT
        let mut q = format!("SELECT DISTINCT pe.{pid} AS {pid}, e.*, {order_col} AS colOrderBy");
        if let Some(c) = &query.distance {
            let (lat, lon) = (self.col("latitude_value"), self.col("longitude_value"));
            q.push_str(&format!(
                ", DEGREES(ACOS(COS(RADIANS(o.{lat})) * COS(RADIANS({clat})) * \
                 COS(RADIANS(o.{lon}) - RADIANS({clon})) + \
                 SIN(RADIANS(o.{lat})) * SIN(RADIANS({clat})))) AS distance",
                clat = float(c.lat),
                clon = float(c.lon),
            ));
        }

        // FROM
        q.push_str(" FROM Event AS e, PublicObject AS pe, Origin AS o, PublicObject AS po");
        match source {
            MagnitudeSource::None => {}
            MagnitudeSource::Preferred => q.push_str(", Magnitude AS m, PublicObject AS pm"),
            MagnitudeSource::PreferredOrigin | MagnitudeSource::DerivedOrigins => {
                q.push_str(", Magnitude AS m")
            }
        }

        // WHERE
        q.push_str(&format!(
            " WHERE e._oid = pe._oid AND o._oid = po._oid AND po.{pid} = e.{}",
            self.col("preferredOriginID")
        ));
        if query.filter != Predicate::True {
            q.push_str(" AND ");
            q.push_str(&self.predicate(&query.filter));
        }
        match source {
            MagnitudeSource::None => {}
            MagnitudeSource::Preferred => q.push_str(&format!(
                " AND m._oid = pm._oid AND pm.{pid} = e.{}",
                self.col("preferredMagnitudeID")
            )),
            MagnitudeSource::PreferredOrigin => q.push_str(" AND m._parent_oid = po._oid"),
            MagnitudeSource::DerivedOrigins => q.push_str(&format!(
                " AND m._parent_oid IN (SELECT pdo._oid FROM PublicObject pfm, MomentTensor mt, \
                 PublicObject pdo WHERE pfm.{pid} = e.{} AND mt._parent_oid = pfm._oid AND \
                 pdo.{pid} = mt.{})",
                self.col("preferredFocalMechanismID"),
                self.col("derivedOriginID"),
            )),
        }
        q
    }

    fn field(&self, field: Field) -> String {
        match field {
            Field::EventType => format!("e.{}", self.col("type")),
            Field::EventAgency => format!("UPPER(e.{})", self.col("creationinfo_agencyID")),
            Field::OriginTime => format!("o.{}", self.col("time_value")),
            Field::OriginLatitude => format!("o.{}", self.col("latitude_value")),
            Field::OriginLongitude => format!("o.{}", self.col("longitude_value")),
            Field::OriginDepth => format!("o.{}", self.col("depth_value")),
            Field::OriginEvaluationMode => format!("o.{}", self.col("evaluationMode")),
            Field::MagnitudeValue => format!("m.{}", self.col("magnitude_value")),
            Field::MagnitudeType => format!("m.{}", self.col("type")),
        }
    }

    fn predicate(&self, p: &Predicate) -> String {
        match p {
            Predicate::True => "1 = 1".to_string(),
            Predicate::And(terms) => terms
                .iter()
                .map(|t| self.nested(t))
                .collect::<Vec<_>>()
                .join(" AND "),
            Predicate::Or(terms) => format!(
                "({})",
                terms
                    .iter()
                    .map(|t| self.nested(t))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            ),
            Predicate::Not(inner) => format!("NOT ({})", self.predicate(inner)),
            Predicate::Compare { field, op, value } => {
                let op = match op {
                    CmpOp::Eq => "=",
                    CmpOp::Ge => ">=",
                    CmpOp::Le => "<=",
                };
                format!("{} {op} {}", self.field(*field), literal(value))
            }
            Predicate::InSet { field, values, negated } => {
                let list = values
                    .iter()
                    .map(|v| quote(v))
                    .collect::<Vec<_>>()
                    .join(", ");
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {op} ({list})", self.field(*field))
            }
            Predicate::IsNull(field) => format!("{} IS NULL", self.field(*field)),
        }
    }

    /// Parenthesise conjunctions nested below a disjunction.
    fn nested(&self, p: &Predicate) -> String {
        match p {
            Predicate::And(_) => format!("({})", self.predicate(p)),
            _ => self.predicate(p),
        }
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Float(v) => float(*v),
        Value::Time(t) => quote(&t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        Value::Text(s) => quote(s),
    }
}

fn float(v: f64) -> String {
    format!("{v}")
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
