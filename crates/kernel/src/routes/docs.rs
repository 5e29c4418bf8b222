//! OpenAPI document.
//!
//! Hand-maintained description of the public surface, served at
//! `/v3/api-docs` outside of authentication and rate limiting.

use std::sync::LazyLock;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

static OPENAPI: LazyLock<Value> = LazyLock::new(build_document);

/// Create the API docs router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v3/api-docs", get(api_docs))
}

async fn api_docs() -> Json<Value> {
    Json(OPENAPI.clone())
}

fn build_document() -> Value {
    let error = json!({ "$ref": "#/components/schemas/Error" });
    let expense = json!({ "$ref": "#/components/schemas/Expense" });
    let id_param = json!({
        "name": "id", "in": "path", "required": true,
        "schema": { "type": "integer", "format": "int64" }
    });
    let too_many = json!({
        "description": "Rate limit exceeded",
        "headers": { "Retry-After": { "schema": { "type": "integer" } } },
        "content": { "application/json": { "schema": {
            "$ref": "#/components/schemas/RateLimitExceeded"
        } } }
    });
    let json_body = |schema: &Value| json!({ "application/json": { "schema": schema } });

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Tally API",
            "description": "Personal expense tracking with bearer token authentication \
                            and per-client rate limiting.",
            "version": env!("CARGO_PKG_VERSION")
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            },
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": { "message": { "type": "string" } }
                },
                "RateLimitExceeded": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "retryAfterSeconds": { "type": "integer" }
                    }
                },
                "Register": {
                    "type": "object",
                    "required": ["name", "email", "password"],
                    "properties": {
                        "name": { "type": "string" },
                        "email": { "type": "string", "format": "email" },
                        "password": { "type": "string", "minLength": 8 }
                    }
                },
                "Login": {
                    "type": "object",
                    "required": ["email", "password"],
                    "properties": {
                        "email": { "type": "string" },
                        "password": { "type": "string" }
                    }
                },
                "Token": {
                    "type": "object",
                    "properties": {
                        "token": { "type": "string" },
                        "tokenType": { "type": "string" },
                        "expiresIn": { "type": "integer" }
                    }
                },
                "Expense": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "format": "int64" },
                        "amount": { "type": "number" },
                        "category": { "type": "string" },
                        "description": { "type": "string", "nullable": true },
                        "expenseDate": { "type": "string", "format": "date" },
                        "createdAt": { "type": "string", "format": "date-time" }
                    }
                }
            }
        },
        "security": [{ "bearerAuth": [] }],
        "paths": {
            "/auth/register": {
                "post": {
                    "security": [],
                    "requestBody": { "content": json_body(&json!({
                        "$ref": "#/components/schemas/Register"
                    })) },
                    "responses": {
                        "201": { "description": "Registered" },
                        "400": { "description": "Invalid input", "content": json_body(&error) },
                        "409": { "description": "Email taken", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/auth/login": {
                "post": {
                    "security": [],
                    "requestBody": { "content": json_body(&json!({
                        "$ref": "#/components/schemas/Login"
                    })) },
                    "responses": {
                        "200": { "description": "Token issued", "content": json_body(&json!({
                            "$ref": "#/components/schemas/Token"
                        })) },
                        "401": { "description": "Invalid credentials", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/expenses": {
                "get": {
                    "parameters": [
                        { "name": "page", "in": "query", "schema": { "type": "integer" } },
                        { "name": "size", "in": "query", "schema": { "type": "integer" } },
                        { "name": "category", "in": "query", "schema": { "type": "string" } },
                        { "name": "startDate", "in": "query",
                          "schema": { "type": "string", "format": "date" } },
                        { "name": "endDate", "in": "query",
                          "schema": { "type": "string", "format": "date" } }
                    ],
                    "responses": {
                        "200": { "description": "Page of expenses" },
                        "401": { "description": "Unauthenticated", "content": json_body(&error) },
                        "429": too_many
                    }
                },
                "post": {
                    "requestBody": { "content": json_body(&expense) },
                    "responses": {
                        "201": { "description": "Created", "content": json_body(&expense) },
                        "400": { "description": "Invalid input", "content": json_body(&error) },
                        "401": { "description": "Unauthenticated", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/expenses/{id}": {
                "parameters": [id_param],
                "get": {
                    "responses": {
                        "200": { "description": "Expense", "content": json_body(&expense) },
                        "404": { "description": "Not found", "content": json_body(&error) },
                        "429": too_many
                    }
                },
                "put": {
                    "requestBody": { "content": json_body(&expense) },
                    "responses": {
                        "200": { "description": "Updated", "content": json_body(&expense) },
                        "404": { "description": "Not found", "content": json_body(&error) },
                        "429": too_many
                    }
                },
                "delete": {
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": { "description": "Not found", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/analytics/total": {
                "get": {
                    "responses": {
                        "200": { "description": "Sum of the caller's expenses",
                                 "content": json_body(&json!({ "type": "number" })) },
                        "403": { "description": "Requires ADMIN", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/analytics/category-summary": {
                "get": {
                    "responses": {
                        "200": { "description": "Totals per category",
                                 "content": json_body(&json!({
                                     "type": "object",
                                     "additionalProperties": { "type": "number" }
                                 })) },
                        "403": { "description": "Requires ADMIN", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/admin/rate-limit": {
                "get": {
                    "responses": {
                        "200": { "description": "Limiter statistics" },
                        "403": { "description": "Requires ADMIN", "content": json_body(&error) },
                        "429": too_many
                    }
                }
            },
            "/health": {
                "get": {
                    "security": [],
                    "responses": { "200": { "description": "Service is healthy" } }
                }
            }
        }
    })
}
