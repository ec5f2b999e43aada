use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use super::model::Avatar;
use crate::storage::StorageClient;

pub const AVATAR_FOLDER: &str = "admin-avatars";

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

/// `None` for anything that is not an accepted image type.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub async fn upload_avatar(
    storage: &dyn StorageClient,
    img: UploadItem<'_>,
) -> anyhow::Result<Avatar> {
    let ext = ext_from_mime(img.content_type).context("unsupported avatar type")?;
    let key = format!("{}/{}.{}", AVATAR_FOLDER, Uuid::new_v4(), ext);
    storage
        .put_object(&key, img.body, img.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(Avatar {
        url: storage.public_url(&key),
        public_id: key,
    })
}
