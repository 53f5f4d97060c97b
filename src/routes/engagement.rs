//! Engagement API routes
//!
//! Thin glue over the engagement ledger: resolve the caller, provision
//! lazily, dispatch to the ledger, respond with authoritative values.
//!
//! Route pattern:
//! - `GET  /api/v1/me` - profile and engagement summary
//! - `GET  /api/v1/me/{saved|liked|viewed}?limit=N` - expanded relation sets
//! - `POST /api/v1/ideas/{id}/{view|like|save|reconcile}`
//! - `DELETE /api/v1/ideas/{id}/{like|save}`

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::db::schemas::{IdeaDoc, SubscriptionTier, UserDoc};
use crate::server::AppState;
use crate::store::RelationSet;
use crate::types::LedgerError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Action on a single idea
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdeaAction {
    View,
    Like,
    Unlike,
    Save,
    Unsave,
    Reconcile,
}

/// Parsed engagement route
#[derive(Debug, PartialEq, Eq)]
pub enum EngagementRoute {
    /// Caller profile and engagement summary
    Me,
    /// One of the caller's relation sets, expanded
    MeRelation(RelationSet),
    /// A ledger operation on one idea
    IdeaAction {
        idea_id: String,
        action: IdeaAction,
    },
}

impl EngagementRoute {
    /// Parse a method and path like "/api/v1/ideas/{id}/like"
    pub fn parse(method: &Method, path: &str) -> Option<Self> {
        let stripped = path.strip_prefix("/api/v1/")?;

        if *method == Method::GET {
            match stripped {
                "me" => return Some(Self::Me),
                "me/saved" => return Some(Self::MeRelation(RelationSet::Saved)),
                "me/liked" => return Some(Self::MeRelation(RelationSet::Liked)),
                "me/viewed" => return Some(Self::MeRelation(RelationSet::Viewed)),
                _ => {}
            }
        }

        let parts: Vec<&str> = stripped.splitn(3, '/').collect();
        if parts.len() != 3 || parts[0] != "ideas" || parts[1].is_empty() {
            return None;
        }

        let idea_id = urlencoding::decode(parts[1]).ok()?.into_owned();

        let action = match (method, parts[2]) {
            (&Method::POST, "view") => IdeaAction::View,
            (&Method::POST, "like") => IdeaAction::Like,
            (&Method::DELETE, "like") => IdeaAction::Unlike,
            (&Method::POST, "save") => IdeaAction::Save,
            (&Method::DELETE, "save") => IdeaAction::Unsave,
            (&Method::POST, "reconcile") => IdeaAction::Reconcile,
            _ => return None,
        };

        Some(Self::IdeaAction { idea_id, action })
    }
}

// =============================================================================
// Response payloads
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Caller profile with engagement summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
    pub subscription_tier: SubscriptionTier,
    pub is_premium: bool,
    pub views_remaining: i64,
    pub reward_points: i64,
    pub saved_count: usize,
    pub liked_count: usize,
    pub viewed_count: usize,
}

impl MeResponse {
    fn from_user(user: &UserDoc) -> Self {
        Self {
            subject_id: user.subject_id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            subscription_tier: user.subscription_tier,
            is_premium: user.is_premium,
            views_remaining: user.views_remaining,
            reward_points: user.reward_points,
            saved_count: user.saved_idea_ids.len(),
            liked_count: user.liked_idea_ids.len(),
            viewed_count: user.viewed_idea_ids.len(),
        }
    }
}

/// One idea in a relation-set expansion
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaSummary {
    pub idea_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub views: i64,
    pub likes: i64,
}

impl IdeaSummary {
    fn from_doc(idea: &IdeaDoc) -> Self {
        Self {
            idea_id: idea.idea_id.clone(),
            title: idea.title.clone(),
            description: idea.description.clone(),
            category: idea.category.clone(),
            tags: idea.tags.clone(),
            views: idea.views,
            likes: idea.likes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelationResponse {
    success: bool,
    ideas: Vec<IdeaSummary>,
}

// =============================================================================
// Response helpers
// =============================================================================

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

fn error_response(err: &LedgerError) -> Response<BoxBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
            code: err.code(),
        },
    )
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn get_auth_header(req: &Request<hyper::body::Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Parse `limit` from a query string like "limit=10"
fn parse_limit(query: Option<&str>) -> Option<usize> {
    let query = query?;
    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            if key == "limit" {
                let value = urlencoding::decode(value).unwrap_or_default();
                return value.parse().ok();
            }
        }
    }
    None
}

// =============================================================================
// Request handling
// =============================================================================

/// Handle a request under /api/v1/
pub async fn handle_engagement_request(
    state: Arc<AppState>,
    req: Request<hyper::body::Incoming>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    let route = match EngagementRoute::parse(&method, &path) {
        Some(r) => r,
        None => {
            return json_response(
                StatusCode::NOT_FOUND,
                &ErrorResponse {
                    error: format!("No such route: {} {}", method, path),
                    code: "NOT_FOUND",
                },
            )
        }
    };

    // Every engagement route is authenticated
    let identity = match state.validator.resolve_caller(get_auth_header(&req)) {
        Ok(identity) => identity,
        Err(e) => return error_response(&e),
    };

    let user = match state.ledger.ensure_user(&identity).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    match route {
        EngagementRoute::Me => json_response(StatusCode::OK, &MeResponse::from_user(&user)),

        EngagementRoute::MeRelation(set) => {
            let limit = parse_limit(query.as_deref());
            match state.reader.expand(set.get(&user), limit).await {
                Ok(ideas) => json_response(
                    StatusCode::OK,
                    &RelationResponse {
                        success: true,
                        ideas: ideas.iter().map(IdeaSummary::from_doc).collect(),
                    },
                ),
                Err(e) => error_response(&e),
            }
        }

        EngagementRoute::IdeaAction { idea_id, action } => {
            let subject_id = &user.subject_id;
            match action {
                IdeaAction::View => match state.ledger.consume_view(subject_id, &idea_id).await {
                    Ok(receipt) => json_response(StatusCode::OK, &receipt),
                    Err(e) => error_response(&e),
                },
                IdeaAction::Like => match state.ledger.like(subject_id, &idea_id).await {
                    Ok(receipt) => json_response(StatusCode::OK, &receipt),
                    Err(e) => error_response(&e),
                },
                IdeaAction::Unlike => match state.ledger.unlike(subject_id, &idea_id).await {
                    Ok(receipt) => json_response(StatusCode::OK, &receipt),
                    Err(e) => error_response(&e),
                },
                IdeaAction::Save => match state.ledger.save(subject_id, &idea_id).await {
                    Ok(receipt) => json_response(StatusCode::OK, &receipt),
                    Err(e) => error_response(&e),
                },
                IdeaAction::Unsave => match state.ledger.unsave(subject_id, &idea_id).await {
                    Ok(receipt) => json_response(StatusCode::OK, &receipt),
                    Err(e) => error_response(&e),
                },
                IdeaAction::Reconcile => {
                    match state.ledger.reconcile_idea_likes(&idea_id).await {
                        Ok(report) => json_response(StatusCode::OK, &report),
                        Err(e) => error_response(&e),
                    }
                }
            }
        }
    }
}
