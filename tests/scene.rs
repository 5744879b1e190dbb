#![cfg(feature = "scene")]

use std::io::Cursor;

use anyhow::Result;

use deimos::prelude::*;

mod framework;

const QUAD: &str = "\
o quad
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vn 0.0 0.0 1.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
o tri
v 0.0 0.0 1.0
v 1.0 0.0 1.0
v 0.0 1.0 1.0
f 5 6 7
";

#[test]
pub fn import_triangulates_and_keeps_file_order() -> Result<()> {
    framework::init_logger();
    let importer = SceneImporter::new();
    let scene = importer.import_reader(&mut Cursor::new(QUAD))?;
    assert_eq!(scene.meshes.len(), 2);

    let quad = &scene.meshes[0];
    assert_eq!(quad.name, "quad");
    assert_eq!(quad.indices.len(), 6, "a quad is split into two triangles");
    assert!(quad.indices.iter().all(|index| (*index as usize) < quad.vertices.len()));
    assert!(quad
        .vertices
        .iter()
        .all(|vertex| vertex.normal == [0.0, 0.0, 1.0]));

    let tri = &scene.meshes[1];
    assert_eq!(tri.name, "tri");
    assert_eq!(tri.vertices.len(), 3);
    // No normals or texture coordinates in the source.
    assert!(tri
        .vertices
        .iter()
        .all(|vertex| vertex.normal == [0.0; 3] && vertex.tex_coord == [0.0; 2]));
    assert_eq!(scene.vertex_count(), quad.vertices.len() + 3);
    Ok(())
}

#[test]
pub fn import_of_missing_file_fails() -> Result<()> {
    let importer = SceneImporter::default();
    let err = importer.import("this/file/does/not/exist.obj").unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::SceneImport(_))));
    Ok(())
}

#[test]
pub fn importers_are_independent() -> Result<()> {
    let first = SceneImporter::new();
    let second = SceneImporter::new();
    let a = first.import_reader(&mut Cursor::new(QUAD))?;
    drop(first);
    let b = second.import_reader(&mut Cursor::new(QUAD))?;
    assert_eq!(a, b);
    Ok(())
}
