//! Store listing, detail, tag browsing and the add/edit forms.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State, multipart::MultipartError},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use tower_sessions::Session;

use delicious_core::{StoreId, UserId};

use crate::error::{AppError, Result};
use crate::middleware::{Page, RequireAuth, push_flash};
use crate::models::{Flash, Store, TagCount};
use crate::services::stores::{LocationInput, StoreError, StoreInput, check_input};
use crate::state::AppState;

/// Tags offered on the store form.
pub const TAG_CHOICES: [&str; 5] = [
    "Wifi",
    "Open Late",
    "Family Friendly",
    "Vegetarian",
    "Licensed",
];

// =============================================================================
// Templates
// =============================================================================

/// Store listing.
#[derive(Template, WebTemplate)]
#[template(path = "stores.html")]
pub struct StoresTemplate {
    pub page: Page,
    pub stores: Vec<Store>,
}

/// Store detail.
#[derive(Template, WebTemplate)]
#[template(path = "store.html")]
pub struct StoreTemplate {
    pub page: Page,
    pub store: Store,
    pub can_edit: bool,
}

/// Tag browser.
#[derive(Template, WebTemplate)]
#[template(path = "tags.html")]
pub struct TagsTemplate {
    pub page: Page,
    pub tags: Vec<TagCount>,
    pub active: Option<String>,
    pub stores: Vec<Store>,
}

/// Add/edit form.
#[derive(Template, WebTemplate)]
#[template(path = "edit_store.html")]
pub struct EditStoreTemplate {
    pub page: Page,
    pub title: String,
    pub action: String,
    pub form: StoreFormView,
}

/// A checkbox on the store form.
pub struct TagOption {
    pub name: &'static str,
    pub checked: bool,
}

/// Values pre-filled into the store form.
pub struct StoreFormView {
    pub name: String,
    pub description: String,
    pub address: String,
    pub lng: String,
    pub lat: String,
    pub photo: Option<String>,
    pub tag_options: Vec<TagOption>,
}

impl StoreFormView {
    fn empty() -> Self {
        Self::with_tags(&[])
    }

    fn with_tags(tags: &[String]) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            address: String::new(),
            lng: String::new(),
            lat: String::new(),
            photo: None,
            tag_options: TAG_CHOICES
                .iter()
                .map(|&name| TagOption {
                    name,
                    checked: tags.iter().any(|t| t == name),
                })
                .collect(),
        }
    }

    fn from_store(store: &Store) -> Self {
        let location = store.location.as_ref();
        Self {
            name: store.name.clone(),
            description: store.description.clone(),
            address: location
                .and_then(|l| l.address.clone())
                .unwrap_or_default(),
            lng: location
                .map(|l| l.coordinates.lng.to_string())
                .unwrap_or_default(),
            lat: location
                .map(|l| l.coordinates.lat.to_string())
                .unwrap_or_default(),
            photo: store.photo.clone(),
            ..Self::with_tags(&store.tags)
        }
    }
}

// =============================================================================
// Multipart form
// =============================================================================

/// An uploaded photo awaiting processing.
struct Upload {
    bytes: Bytes,
    content_type: String,
}

/// Raw fields of the store form.
#[derive(Default)]
struct StoreForm {
    name: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    address: Option<String>,
    lng: Option<String>,
    lat: Option<String>,
    photo: Option<Upload>,
}

fn bad_multipart(err: &MultipartError) -> AppError {
    AppError::BadRequest(format!("invalid form data: {err}"))
}

impl StoreForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| bad_multipart(&e))? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "photo" {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| bad_multipart(&e))?;
                if !bytes.is_empty() {
                    form.photo = Some(Upload {
                        bytes,
                        content_type,
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(|e| bad_multipart(&e))?;
            match name.as_str() {
                "name" => form.name = Some(value),
                "description" => form.description = Some(value),
                "tags" => form.tags.push(value),
                "address" => form.address = Some(value),
                "lng" => form.lng = Some(value),
                "lat" => form.lat = Some(value),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Turn the raw coordinates into a location, if both were filled in.
    ///
    /// Blank coordinates mean "no location submitted", so an edit leaves an
    /// existing location as it was. An address on its own is rejected.
    fn location(&self) -> std::result::Result<Option<LocationInput>, String> {
        let filled = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match (filled(&self.lng), filled(&self.lat)) {
            (None, None) if filled(&self.address).is_some() => {
                Err("An address needs a longitude and a latitude".to_string())
            }
            (None, None) => Ok(None),
            (Some(lng), Some(lat)) => match (lng.parse::<f64>(), lat.parse::<f64>()) {
                (Ok(lng), Ok(lat)) => Ok(Some(LocationInput {
                    coordinates: [lng, lat],
                    address: self.address.clone(),
                })),
                _ => Err("Coordinates must be numbers".to_string()),
            },
            _ => Err("You must supply both a longitude and a latitude".to_string()),
        }
    }
}

/// Parse and validate the form, then store any photo.
///
/// The photo is only stored once everything else has passed, so a rejected
/// submission leaves nothing in the uploads directory. Problems with the
/// submission come back as `Ok(Err(messages))`.
async fn store_input(
    state: &AppState,
    multipart: Multipart,
    creating: bool,
) -> Result<std::result::Result<StoreInput, Vec<String>>> {
    let form = StoreForm::read(multipart).await?;

    let location = match form.location() {
        Ok(location) => location,
        Err(message) => return Ok(Err(vec![message])),
    };

    let mut input = StoreInput {
        name: form.name,
        description: form.description,
        tags: Some(form.tags),
        location,
        photo: None,
    };

    match check_input(&input, creating) {
        Ok(()) => {}
        Err(StoreError::Validation(messages)) => return Ok(Err(messages)),
        Err(e) => return Err(e.into()),
    }

    if let Some(upload) = form.photo {
        match state
            .photos()
            .process(upload.bytes, &upload.content_type)
            .await
        {
            Ok(filename) => input.photo = Some(filename),
            Err(e) if e.is_bad_upload() => return Ok(Err(vec![e.to_string()])),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Ok(input))
}

/// Remove a photo stored for a write that then failed.
async fn discard_photo(state: &AppState, photo: Option<&str>) {
    let Some(filename) = photo else {
        return;
    };
    if let Err(e) = state.photos().discard(filename).await {
        tracing::warn!(error = %e, %filename, "failed to discard unused photo");
    }
}

/// Flash each message and redirect to `to`.
async fn reject(session: &Session, messages: Vec<String>, to: &str) -> Result<Response> {
    for message in messages {
        push_flash(session, Flash::error(message)).await?;
    }
    Ok(Redirect::to(to).into_response())
}

/// Map a store error to a flash and redirect, or an `AppError`.
async fn store_error(session: &Session, err: StoreError, back: &str) -> Result<Response> {
    match err {
        StoreError::Validation(messages) => reject(session, messages, back).await,
        StoreError::SlugConflict => reject(session, vec![err.to_string()], back).await,
        StoreError::NotOwner => reject(session, vec![err.to_string()], "/stores").await,
        other => Err(other.into()),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List every store.
pub async fn index(State(state): State<AppState>, page: Page) -> Result<impl IntoResponse> {
    let stores = state.stores().list().await?;
    Ok(StoresTemplate { page, stores })
}

/// Show a store by slug.
pub async fn show(
    State(state): State<AppState>,
    page: Page,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let store = state.stores().by_slug(&slug).await?;
    let can_edit = page
        .user
        .as_ref()
        .is_some_and(|u| store.is_editable_by(u.id));
    Ok(StoreTemplate {
        page,
        store,
        can_edit,
    })
}

/// Every tagged store.
pub async fn tags(State(state): State<AppState>, page: Page) -> Result<impl IntoResponse> {
    browse(&state, page, None).await
}

/// Stores carrying one tag.
pub async fn tag(
    State(state): State<AppState>,
    page: Page,
    Path(tag): Path<String>,
) -> Result<impl IntoResponse> {
    browse(&state, page, Some(tag)).await
}

async fn browse(state: &AppState, page: Page, active: Option<String>) -> Result<TagsTemplate> {
    let browse = state.stores().by_tag(active.as_deref()).await?;
    Ok(TagsTemplate {
        page,
        tags: browse.tags,
        active,
        stores: browse.stores,
    })
}

/// New store form.
pub async fn add(RequireAuth(_user): RequireAuth, page: Page) -> impl IntoResponse {
    EditStoreTemplate {
        page,
        title: "Add Store".to_string(),
        action: "/stores".to_string(),
        form: StoreFormView::empty(),
    }
}

/// Create a store from the multipart form.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Response> {
    let input = match store_input(&state, multipart, true).await? {
        Ok(input) => input,
        Err(messages) => return reject(&session, messages, "/add").await,
    };
    let photo = input.photo.clone();

    match state.stores().create(input, Some(user.id)).await {
        Ok(store) => {
            push_flash(
                &session,
                Flash::success(format!(
                    "Successfully Created {}. Care to leave a review?",
                    store.name
                )),
            )
            .await?;
            Ok(Redirect::to(&format!("/store/{}", store.slug)).into_response())
        }
        Err(e) => {
            discard_photo(&state, photo.as_deref()).await;
            store_error(&session, e, "/add").await
        }
    }
}

/// Edit form for a store the user may edit.
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Response> {
    let store = match state.stores().get_editable(StoreId::new(id), user.id).await {
        Ok(store) => store,
        Err(e) => return store_error(&session, e, "/stores").await,
    };

    let page = Page::from_session(&session).await?;
    Ok(EditStoreTemplate {
        page,
        title: format!("Edit {}", store.name),
        action: format!("/stores/{}", store.id),
        form: StoreFormView::from_store(&store),
    }
    .into_response())
}

/// Apply the edit form to a store.
#[tracing::instrument(skip_all, fields(user_id = %user.id, store_id = id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response> {
    let id = StoreId::new(id);
    let back = format!("/stores/{id}/edit");

    if let Err(e) = ensure_editable(&state, id, user.id).await {
        return store_error(&session, e, &back).await;
    }

    let input = match store_input(&state, multipart, false).await? {
        Ok(input) => input,
        Err(messages) => return reject(&session, messages, &back).await,
    };
    let photo = input.photo.clone();

    match state.stores().update(id, input).await {
        Ok(store) => {
            push_flash(
                &session,
                Flash::success(format!("Successfully updated {}.", store.name)),
            )
            .await?;
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => {
            discard_photo(&state, photo.as_deref()).await;
            store_error(&session, e, &back).await
        }
    }
}

async fn ensure_editable(
    state: &AppState,
    id: StoreId,
    user: UserId,
) -> std::result::Result<(), StoreError> {
    state.stores().get_editable(id, user).await.map(|_| ())
}
