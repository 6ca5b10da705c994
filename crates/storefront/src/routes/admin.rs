//! Product administration.
//!
//! Every admin sees and edits only the products they created. Requests for
//! someone else's product are answered exactly like requests for a missing
//! one: a redirect to the home page.
//!
//! Create and edit are multipart forms because they carry the product image,
//! so the anti-forgery token travels in the query string (see
//! [`VerifiedCsrf`]).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use urbanstride_core::{FieldErrors, Product, ProductDraft, ProductId};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CsrfForm, IdPath, PageContext, RequireAuth, VerifiedCsrf, push_flash};
use crate::models::FlashLevel;
use crate::services::{CatalogError, CatalogService, ImageUpload};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Raw text fields of the product form, echoed back when validation fails.
#[derive(Debug, Clone, Default)]
pub struct ProductFormValues {
    pub title: String,
    pub price: String,
    pub description: String,
}

impl From<&Product> for ProductFormValues {
    fn from(product: &Product) -> Self {
        Self {
            title: product.title.clone(),
            price: product.price.to_string(),
            description: product.description.clone(),
        }
    }
}

/// Everything read from a product multipart body.
#[derive(Debug, Default)]
struct ProductForm {
    values: ProductFormValues,
    product_id: Option<String>,
    image: Option<ImageUpload>,
}

/// Query string of the edit page.
#[derive(Debug, Deserialize)]
pub struct EditQuery {
    #[serde(default)]
    pub edit: bool,
}

/// Delete form data.
#[derive(Debug, Deserialize)]
pub struct DeleteProductForm {
    pub product_id: ProductId,
}

// =============================================================================
// Templates
// =============================================================================

/// The admin's own products.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
}

/// Create/edit product form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/edit_product.html")]
pub struct EditProductTemplate {
    pub ctx: PageContext,
    /// `Some` when editing an existing product.
    pub product_id: Option<ProductId>,
    pub image_url: Option<String>,
    pub values: ProductFormValues,
    pub errors: FieldErrors,
}

impl EditProductTemplate {
    #[must_use]
    pub const fn editing(&self) -> bool {
        self.product_id.is_some()
    }

    fn invalid(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, self).into_response()
    }
}

// =============================================================================
// Multipart parsing
// =============================================================================

async fn read_product_form(mut multipart: Multipart) -> std::result::Result<ProductForm, MultipartError> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.values.title = field.text().await?,
            "price" => form.values.price = field.text().await?,
            "description" => form.values.description = field.text().await?,
            "product_id" => form.product_id = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen
                if !(file_name.is_empty() && bytes.is_empty()) {
                    form.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Validate the text fields and the image together so every problem is
/// reported at once.
fn validate_product_form(
    form: &ProductForm,
    image_required: bool,
) -> std::result::Result<ProductDraft, FieldErrors> {
    let draft = ProductDraft::parse(
        &form.values.title,
        &form.values.price,
        &form.values.description,
    );
    let mut errors = draft.as_ref().err().cloned().unwrap_or_default();

    match &form.image {
        Some(upload) if upload.validate().is_err() => {
            errors.add("image", "Attached file is not an image.");
        }
        None if image_required => errors.add("image", "Please attach an image."),
        _ => {}
    }

    match draft {
        Ok(draft) if errors.is_empty() => Ok(draft),
        _ => Err(errors),
    }
}

/// Flash the outcome of a write whose provider sync may have failed.
async fn finish_write(
    session: &Session,
    result: std::result::Result<Product, CatalogError>,
    success: &str,
) -> Result<Response> {
    match result {
        Ok(_) => {
            push_flash(session, FlashLevel::Success, success).await;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(CatalogError::Payment(e)) => {
            tracing::error!(error = %e, "Product saved but payment provider sync failed");
            push_flash(
                session,
                FlashLevel::Error,
                "Product saved, but it could not be registered for payment. Save it again to retry.",
            )
            .await;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

// =============================================================================
// Routes
// =============================================================================

/// List the admin's own products.
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn products(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let products = CatalogService::new(&state).list_owned(user.id).await?;
    Ok(AdminProductsTemplate { ctx, products })
}

/// Display the empty product form.
#[instrument(skip(_user, ctx))]
pub async fn add_product_page(RequireAuth(_user): RequireAuth, ctx: PageContext) -> impl IntoResponse {
    EditProductTemplate {
        ctx,
        product_id: None,
        image_url: None,
        values: ProductFormValues::default(),
        errors: FieldErrors::new(),
    }
}

/// Create a product from the multipart form.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    _csrf: VerifiedCsrf,
    session: Session,
    ctx: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let form = match read_product_form(multipart).await {
        Ok(form) => form,
        Err(e) => return Ok(e.into_response()),
    };

    let draft = match validate_product_form(&form, true) {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(EditProductTemplate {
                ctx,
                product_id: None,
                image_url: None,
                values: form.values,
                errors,
            }
            .invalid());
        }
    };
    let Some(image) = form.image.as_ref() else {
        return Err(AppError::Internal("validated form without image".to_string()));
    };

    let result = CatalogService::new(&state)
        .create(user.id, draft, image)
        .await;
    finish_write(&session, result, "Product created.").await
}

/// Display the edit form for one of the admin's products.
///
/// Only reachable with `?edit=true`; anything else goes back home.
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn edit_product_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
    IdPath(id): IdPath<ProductId>,
    Query(query): Query<EditQuery>,
) -> Result<Response> {
    if !query.edit {
        return Ok(Redirect::to("/").into_response());
    }

    let product = CatalogService::new(&state).get_owned(user.id, id).await?;
    Ok(EditProductTemplate {
        ctx,
        product_id: Some(product.id),
        values: ProductFormValues::from(&product),
        image_url: Some(product.image_url),
        errors: FieldErrors::new(),
    }
    .into_response())
}

/// Apply an edit from the multipart form.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn edit_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    _csrf: VerifiedCsrf,
    session: Session,
    ctx: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let form = match read_product_form(multipart).await {
        Ok(form) => form,
        Err(e) => return Ok(e.into_response()),
    };

    let Some(id) = form
        .product_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<ProductId>().ok())
    else {
        return Err(AppError::NotFound("product".to_string()));
    };

    let catalog = CatalogService::new(&state);
    let draft = match validate_product_form(&form, false) {
        Ok(draft) => draft,
        Err(errors) => {
            let existing = catalog.get_owned(user.id, id).await?;
            return Ok(EditProductTemplate {
                ctx,
                product_id: Some(id),
                image_url: Some(existing.image_url),
                values: form.values,
                errors,
            }
            .invalid());
        }
    };

    let result = catalog.edit(user.id, id, draft, form.image.as_ref()).await;
    finish_write(&session, result, "Product updated.").await
}

/// Delete one of the admin's products.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    CsrfForm(form): CsrfForm<DeleteProductForm>,
) -> Result<impl IntoResponse> {
    CatalogService::new(&state)
        .delete(user.id, form.product_id)
        .await?;
    push_flash(&session, FlashLevel::Success, "Product deleted.").await;
    Ok(Redirect::to("/admin/products"))
}
