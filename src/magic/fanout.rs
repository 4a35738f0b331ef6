//! Projects one result frame into the variables each assign form asks for.

use crate::db::Value;
use crate::directive::AssignForm;
use crate::frame::Frame;
use crate::namespace::{Namespace, Variable};

/// The value bound for `form`. Projections of an empty frame that need a
/// first row come back as NULL.
pub fn project(form: AssignForm, frame: &Frame, sql: &str) -> Variable {
    let value = match form {
        AssignForm::Df => return Variable::Frame(frame.clone()),
        AssignForm::Sql => Value::from(sql),
        AssignForm::Row => frame
            .row()
            .map_or(Value::Null, |row| Value::List(row.clone())),
        AssignForm::Rows => Value::List(frame.rows.iter().cloned().map(Value::List).collect()),
        AssignForm::Col => Value::List(frame.col()),
        AssignForm::Cols => Value::List(frame.cols().into_iter().map(Value::List).collect()),
        AssignForm::Cell => frame.cell().cloned().unwrap_or(Value::Null),
        AssignForm::Record => frame.record().map_or(Value::Null, Value::Record),
        AssignForm::Records => Value::List(frame.records().into_iter().map(Value::Record).collect()),
        AssignForm::Headings => Value::List(frame.headings().into_iter().map(Value::from).collect()),
    };
    Variable::Value(value)
}

/// Writes every requested projection of `frame` into the namespace.
pub fn assign_all(
    namespace: &mut dyn Namespace,
    assigns: &[(AssignForm, String)],
    frame: &Frame,
    sql: &str,
) {
    for (form, target) in assigns {
        namespace.set(target, project(*form, frame, sql));
    }
}
