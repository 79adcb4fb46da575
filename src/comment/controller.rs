use crate::comment::model::{Filter, SortBy, SortOrder};
use crate::comment::service::CommentService;
use crate::utils::error::CustomError;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

/// Query string of the post comments listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListQuery {
    pub fn into_filter(self) -> Result<Filter, CustomError> {
        let page = self.page.unwrap_or(0);
        if page < 0 {
            return Err(CustomError::ValidationError(
                "page must not be negative".to_string(),
            ));
        }
        let page_size = self.page_size.unwrap_or(0);
        if page_size < 0 {
            return Err(CustomError::ValidationError(
                "page_size must not be negative".to_string(),
            ));
        }

        let sort_by = match self.sort_by.as_deref().map(str::trim) {
            None | Some("") => SortBy::default(),
            Some("created_at") => SortBy::CreatedAt,
            Some("updated_at") => SortBy::UpdatedAt,
            Some(other) => {
                return Err(CustomError::ValidationError(format!(
                    "sort_by must be created_at or updated_at, got {other:?}"
                )));
            }
        };
        let sort_order = match self.sort_order.as_deref().map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(other) => {
                return Err(CustomError::ValidationError(format!(
                    "sort_order must be asc or desc, got {other:?}"
                )));
            }
        };

        let filter = Filter::new(page, page_size, sort_by, sort_order);
        if filter.checked_offset().is_none() {
            return Err(CustomError::ValidationError(
                "page is out of range for this page_size".to_string(),
            ));
        }

        Ok(filter)
    }
}

/// Get a single comment by ID
/// GET /comments/{comment_id}
pub async fn get_comment(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let comment_id = path.into_inner();
    if comment_id.trim().is_empty() {
        return Err(CustomError::ValidationError(
            "comment id is required".to_string(),
        ));
    }

    let comment = comment_service.get_by_id(&comment_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment retrieved successfully",
        "httpStatusCode": 200,
        "data": comment
    })))
}

/// List the comments of a post, one page at a time
/// GET /posts/{post_id}/comments
pub async fn get_post_comments(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, CustomError> {
    let post_id = path.into_inner();
    let filter = query.into_inner().into_filter()?;

    let (comments, metadata) = comment_service.list_by_post_id(&post_id, filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comments retrieved successfully",
        "httpStatusCode": 200,
        "data": comments,
        "metadata": metadata
    })))
}
