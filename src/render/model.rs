use std::{
  fs,
  io::{BufRead, Read},
  path::Path,
  sync::Arc,
};

use anyhow::Context;
use glam::Vec3;
use vulkano::{
  buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
};

use crate::{
  error::ModelError,
  render::vertex::{Normal, Position},
};

/// One triangle. Indices are zero-based into [`Model::positions`] and
/// [`Model::normals`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
  pub vertex: [u32; 3],
  /// `None` when the OBJ face had no `vn` references.
  pub normal: Option<[u32; 3]>,
}

/// Triangulated OBJ contents with separate position and normal index streams.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
  pub positions: Vec<Vec3>,
  pub normals:   Vec<Vec3>,
  pub faces:     Vec<Face>,
}

impl Model {
  /// Loads every object in the OBJ file at `path` into a single model.
  ///
  /// Materials are not read; a missing `.mtl` file is not an error.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
    let path = path.as_ref();
    let src = fs::read_to_string(path).map_err(|source| ModelError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&src).map_err(|err| match err {
      ModelError::Parse(source) => ModelError::Load {
        path: path.to_path_buf(),
        source,
      },
      other => other,
    })
  }

  /// Parses OBJ text from a reader. `mtllib` statements are ignored.
  pub fn from_reader(reader: &mut impl BufRead) -> Result<Self, ModelError> {
    let mut src = String::new();
    reader.read_to_string(&mut src)?;
    Self::parse(&src)
  }

  fn parse(src: &str) -> Result<Self, ModelError> {
    let (models, _materials) = tobj::load_obj_buf(&mut src.as_bytes(), &load_options(), |_| {
      Err(tobj::LoadError::OpenFileFailed)
    })?;
    Ok(Self::from_tobj(&models, &triangle_normal_flags(src)))
  }

  /// Concatenates the meshes tobj produced, rebasing each mesh's indices.
  ///
  /// `normal_flags` holds one entry per triangle in file order telling whether
  /// its face referenced normals. tobj pads missing normal indices with zero,
  /// so the index streams alone cannot tell.
  fn from_tobj(models: &[tobj::Model], normal_flags: &[bool]) -> Self {
    let triangles: usize = models.iter().map(|m| m.mesh.indices.len() / 3).sum();
    let flags = if normal_flags.len() == triangles {
      Some(normal_flags)
    } else {
      log::warn!(
        "counted {} triangles in face statements but tobj produced {triangles}; \
         using per-mesh normal detection",
        normal_flags.len()
      );
      None
    };

    let mut model = Model::default();

    for mesh in models.iter().map(|m| &m.mesh) {
      let position_base = model.positions.len() as u32;
      let normal_base = model.normals.len() as u32;

      model.positions.extend(
        mesh
          .positions
          .chunks_exact(3)
          .map(|xyz| Vec3::new(xyz[0], xyz[1], xyz[2])),
      );
      model.normals.extend(
        mesh
          .normals
          .chunks_exact(3)
          .map(|xyz| Vec3::new(xyz[0], xyz[1], xyz[2])),
      );

      let has_normals = !mesh.normals.is_empty() && mesh.normal_indices.len() == mesh.indices.len();
      for (i, tri) in mesh.indices.chunks_exact(3).enumerate() {
        let face_has_normals = flags.is_none_or(|flags| flags[model.faces.len()]);
        let normal = (has_normals && face_has_normals).then(|| {
          let n = &mesh.normal_indices[i * 3..i * 3 + 3];
          [n[0] + normal_base, n[1] + normal_base, n[2] + normal_base]
        });
        model.faces.push(Face {
          vertex: [
            tri[0] + position_base,
            tri[1] + position_base,
            tri[2] + position_base,
          ],
          normal,
        });
      }
    }

    model
  }
}

/// One flag per triangle tobj will emit, in file order: whether every corner
/// of the source face carries a `vn` reference. Points and two-vertex lines
/// produce no triangles.
fn triangle_normal_flags(src: &str) -> Vec<bool> {
  let mut flags = Vec::new();
  for line in src.lines() {
    let mut words = line.split_whitespace();
    if !matches!(words.next(), Some("f" | "l")) {
      continue;
    }
    let corners: Vec<&str> = words.collect();
    if corners.len() < 3 {
      continue;
    }
    let has_normals = corners
      .iter()
      .all(|corner| corner.split('/').nth(2).is_some_and(|n| !n.is_empty()));
    flags.extend(std::iter::repeat_n(has_normals, corners.len() - 2));
  }
  flags
}

fn load_options() -> tobj::LoadOptions {
  tobj::LoadOptions {
    triangulate: true,
    single_index: false,
    ignore_points: true,
    ignore_lines: true,
    ..Default::default()
  }
}

/// Non-indexed vertex streams ready for upload: vertex `i` of the draw reads
/// `positions[i]` and `normals[i]`, three vertices per face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedMesh {
  pub positions: Vec<Position>,
  pub normals:   Vec<Normal>,
}

impl PackedMesh {
  /// Expands every face into three vertices.
  ///
  /// Faces without normal references get their flat geometric normal on all
  /// three corners (zero for degenerate triangles).
  pub fn from_model(model: &Model) -> Result<Self, ModelError> {
    if model.faces.is_empty() {
      return Err(ModelError::Empty);
    }

    let mut packed = PackedMesh {
      positions: Vec::with_capacity(model.faces.len() * 3),
      normals:   Vec::with_capacity(model.faces.len() * 3),
    };

    for (face_index, face) in model.faces.iter().enumerate() {
      let corners = lookup(&model.positions, face.vertex, face_index, "vertex")?;

      let normals = match face.normal {
        Some(indices) => lookup(&model.normals, indices, face_index, "normal")?,
        None => {
          let flat = (corners[1] - corners[0])
            .cross(corners[2] - corners[0])
            .normalize_or_zero();
          [flat; 3]
        }
      };

      packed.positions.extend(corners.map(|p| Position {
        position: p.to_array(),
      }));
      packed
        .normals
        .extend(normals.map(|n| Normal { normal: n.to_array() }));
    }

    Ok(packed)
  }

  pub fn vertex_count(&self) -> u32 {
    self.positions.len() as u32
  }
}

fn lookup(
  values: &[Vec3],
  indices: [u32; 3],
  face: usize,
  kind: &'static str,
) -> Result<[Vec3; 3], ModelError> {
  let get = |index: u32| {
    values
      .get(index as usize)
      .copied()
      .ok_or(ModelError::IndexOutOfRange {
        face,
        kind,
        index,
        len: values.len(),
      })
  };
  Ok([get(indices[0])?, get(indices[1])?, get(indices[2])?])
}

/// GPU vertex buffers for the packed model.
///
/// Both buffers hold `vertex_count` elements and are bound together, positions
/// at slot 0 and normals at slot 1, for a plain non-indexed triangle list draw.
pub struct ModelBuffers {
  pub positions:    Subbuffer<[Position]>,
  pub normals:      Subbuffer<[Normal]>,
  pub vertex_count: u32,
}

impl ModelBuffers {
  /// Copies the packed streams into device-preferred, host-writable memory.
  pub fn upload(
    memory_allocator: Arc<StandardMemoryAllocator>,
    mesh: &PackedMesh,
  ) -> anyhow::Result<Self> {
    let positions = Buffer::from_iter(
      memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::VERTEX_BUFFER,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
          | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
        ..Default::default()
      },
      mesh.positions.iter().copied(),
    )
    .context("failed to create position buffer")?;

    let normals = Buffer::from_iter(
      memory_allocator,
      BufferCreateInfo {
        usage: BufferUsage::VERTEX_BUFFER,
        ..Default::default()
      },
      AllocationCreateInfo {
        memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
          | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
        ..Default::default()
      },
      mesh.normals.iter().copied(),
    )
    .context("failed to create normal buffer")?;

    Ok(ModelBuffers {
      positions,
      normals,
      vertex_count: mesh.vertex_count(),
    })
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;

  const QUAD_WITH_NORMALS: &str = "
    # unit quad facing +Z
    v 0.0 0.0 0.0
    v 1.0 0.0 0.0
    v 1.0 1.0 0.0
    v 0.0 1.0 0.0
    vn 0.0 0.0 1.0
    f 1//1 2//1 3//1 4//1
  ";

  fn parse(src: &str) -> Model {
    Model::from_reader(&mut Cursor::new(src)).expect("parse OBJ")
  }

  #[test]
  fn polygons_are_triangulated() {
    let model = parse(QUAD_WITH_NORMALS);
    assert_eq!(model.positions.len(), 4);
    assert_eq!(model.normals.len(), 1);
    assert_eq!(model.faces.len(), 2);
    assert!(model.faces.iter().all(|f| f.normal == Some([0, 0, 0])));
  }

  #[test]
  fn packing_expands_faces_in_order() {
    let model = Model {
      positions: vec![Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE],
      normals:   vec![Vec3::NEG_Z, Vec3::Z],
      faces:     vec![
        Face {
          vertex: [0, 1, 2],
          normal: Some([1, 1, 1]),
        },
        Face {
          vertex: [3, 2, 1],
          normal: Some([0, 1, 0]),
        },
      ],
    };

    let packed = PackedMesh::from_model(&model).unwrap();
    assert_eq!(packed.vertex_count(), 6);

    let positions: Vec<_> = packed.positions.iter().map(|p| p.position).collect();
    assert_eq!(positions, vec![
      [1.0, 0.0, 0.0],
      [0.0, 1.0, 0.0],
      [0.0, 0.0, 1.0],
      [1.0, 1.0, 1.0],
      [0.0, 0.0, 1.0],
      [0.0, 1.0, 0.0],
    ]);

    let normals: Vec<_> = packed.normals.iter().map(|n| n.normal).collect();
    assert_eq!(normals[..3], [[0.0, 0.0, 1.0]; 3]);
    assert_eq!(normals[3..], [[0.0, 0.0, -1.0], [0.0, 0.0, 1.0], [0.0, 0.0, -1.0]]);
  }

  #[test]
  fn missing_normals_are_generated_per_face() {
    let model = parse(
      "
      v 0 0 0
      v 1 0 0
      v 0 1 0
      f 1 2 3
      ",
    );
    assert!(model.faces[0].normal.is_none());

    let packed = PackedMesh::from_model(&model).unwrap();
    assert_eq!(packed.normals.len(), 3);
    assert!(packed.normals.iter().all(|n| n.normal == [0.0, 0.0, 1.0]));
  }

  #[test]
  fn faces_without_normals_keep_flat_normal_in_mixed_mesh() {
    let model = parse(
      "
      v 0 0 0
      v 1 0 0
      v 0 1 0
      v 0 0 1
      vn 1 0 0
      f 1//1 3//1 4//1
      f 1 2 3
      ",
    );
    assert_eq!(model.faces.len(), 2);
    assert_eq!(model.faces[0].normal, Some([0, 0, 0]));
    assert_eq!(model.faces[1].normal, None);

    let packed = PackedMesh::from_model(&model).unwrap();
    assert!(packed.normals[..3].iter().all(|n| n.normal == [1.0, 0.0, 0.0]));
    assert!(packed.normals[3..].iter().all(|n| n.normal == [0.0, 0.0, 1.0]));
  }

  #[test]
  fn normal_flags_follow_triangulation() {
    let flags = triangle_normal_flags(
      "
      # comment f 1 2 3
      f 1//1 2//1 3//1 4//1
      f 1/1 2/2 3/3
      f 1/1/1 2/2/ 3/3/3
      l 1 2
      f 1 2 3 4 5
      ",
    );
    assert_eq!(flags, vec![true, true, false, false, false, false, false]);
  }

  #[test]
  fn degenerate_face_gets_zero_normal() {
    let model = Model {
      positions: vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
      normals:   vec![],
      faces:     vec![Face {
        vertex: [0, 1, 2],
        normal: None,
      }],
    };
    let packed = PackedMesh::from_model(&model).unwrap();
    assert!(packed.normals.iter().all(|n| n.normal == [0.0; 3]));
  }

  #[test]
  fn objects_are_concatenated_with_rebased_indices() {
    let model = parse(
      "
      o first
      v 0 0 0
      v 1 0 0
      v 0 1 0
      f 1 2 3
      o second
      v 0 0 5
      v 1 0 5
      v 0 1 5
      f 4 5 6
      ",
    );
    assert_eq!(model.faces.len(), 2);
    let packed = PackedMesh::from_model(&model).unwrap();
    assert_eq!(packed.positions[3].position, [0.0, 0.0, 5.0]);
    assert_eq!(packed.positions[5].position, [0.0, 1.0, 5.0]);
  }

  #[test]
  fn out_of_range_index_is_reported() {
    let model = Model {
      positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
      normals:   vec![Vec3::Z],
      faces:     vec![Face {
        vertex: [0, 1, 2],
        normal: Some([0, 0, 3]),
      }],
    };
    match PackedMesh::from_model(&model) {
      Err(ModelError::IndexOutOfRange {
        face: 0,
        kind: "normal",
        index: 3,
        len: 1,
      }) => {}
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[test]
  fn empty_model_is_rejected() {
    let model = parse("v 0 0 0\nv 1 0 0\n");
    assert!(matches!(PackedMesh::from_model(&model), Err(ModelError::Empty)));
  }

  #[test]
  fn missing_file_reports_path() {
    let err = Model::load("does/not/exist.obj").unwrap_err();
    assert!(err.to_string().contains("does/not/exist.obj"));
  }

  #[test]
  fn bundled_cube_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/res/models/cube.obj");
    let model = Model::load(path).expect("bundled cube");
    assert_eq!(model.faces.len(), 12);
    let packed = PackedMesh::from_model(&model).unwrap();
    assert_eq!(packed.vertex_count(), 36);
    for n in &packed.normals {
      assert!((Vec3::from_array(n.normal).length() - 1.0).abs() < 1e-5);
    }
  }
}
