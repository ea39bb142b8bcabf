use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// The slice of the user document the report job needs. Users are owned by
/// the authentication flow; this service only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
}
