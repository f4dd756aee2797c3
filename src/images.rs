use crate::config::ImageConfig;

/// Public delivery URL for an image stored with the hosting provider.
pub fn image_url(cfg: &ImageConfig, public_id: &str) -> String {
    format!(
        "https://res.cloudinary.com/{}/image/upload/{}",
        cfg.cloud_name, public_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_delivery_url() {
        let cfg = ImageConfig {
            cloud_name: "demo".into(),
            default_public_id: "x".into(),
        };
        assert_eq!(
            image_url(&cfg, "avatar123"),
            "https://res.cloudinary.com/demo/image/upload/avatar123"
        );
    }
}
