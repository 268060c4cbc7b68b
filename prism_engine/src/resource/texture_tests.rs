use super::*;

#[test]
fn test_rgba_texture_uploads_unchanged() {
    let texture = Texture2D::new("rgba", 2, 1, 4, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let (format, data) = texture.upload_data();
    assert_eq!(format, TextureFormat::R8G8B8A8_SRGB);
    assert!(matches!(data, Cow::Borrowed(_)));
    assert_eq!(&*data, texture.pixels());
}

#[test]
fn test_rgb_texture_expands_to_rgba() {
    let texture = Texture2D::new("rgb", 2, 1, 3, vec![10, 20, 30, 40, 50, 60]).unwrap().with_linear_color();
    let (format, data) = texture.upload_data();
    assert_eq!(format, TextureFormat::R8G8B8A8_UNORM);
    assert_eq!(&*data, &[10, 20, 30, 255, 40, 50, 60, 255]);

    let desc = texture.desc(format, &data);
    assert_eq!(desc.expected_size(), data.len());
}

#[test]
fn test_single_channel_texture() {
    let texture = Texture2D::new("mask", 2, 2, 1, vec![0; 4]).unwrap();
    assert_eq!(texture.upload_data().0, TextureFormat::R8_UNORM);
}

#[test]
fn test_invalid_textures_are_rejected() {
    assert!(matches!(Texture2D::new("short", 2, 2, 4, vec![0; 15]), Err(Error::InvalidResource(_))));
    assert!(Texture2D::new("empty", 0, 2, 4, Vec::new()).is_err());
    assert!(Texture2D::new("five", 1, 1, 5, vec![0; 5]).is_err());
}

#[test]
fn test_cubemap_faces() {
    let faces: Vec<Vec<u8>> = (0..6u8).map(|f| vec![f; 4]).collect();
    let cubemap = TextureCubemap::from_faces("sky", 1, 4, [
        faces[0].as_slice(), faces[1].as_slice(), faces[2].as_slice(),
        faces[3].as_slice(), faces[4].as_slice(), faces[5].as_slice(),
    ]).unwrap();

    assert_eq!(cubemap.size(), 1);
    assert_eq!(cubemap.face(3), Some(&[3u8, 3, 3, 3][..]));
    assert_eq!(cubemap.face(6), None);

    let (format, data) = cubemap.upload_data();
    let desc = cubemap.desc(format, &data);
    assert_eq!(desc.kind, TextureKind::Cubemap);
    assert_eq!(desc.expected_size(), 24);
}

#[test]
fn test_cubemap_size_is_validated() {
    assert!(TextureCubemap::new("bad", 2, 4, vec![0; 16]).is_err());
}
