//! Fixtures shared by tests.
//!
use std::{io, sync::Arc};

use ndarray::{array, Array, ArrayD, IxDyn};
use parking_lot::Mutex;

use crate::{
    coord::Coord,
    element::Element,
    errors::Result,
    factory::{AuxCoordFactory, CoordMapping},
    formula::HybridHeightFactory,
    metadata::CoordMetadata,
};

/// A bare bones host array, which only knows which dimensions its coordinates span.
pub(crate) struct Cube<F>
where
    F: Element,
{
    coords: Vec<(Arc<Coord<F>>, Vec<usize>)>,
    factories: Vec<Box<dyn AuxCoordFactory<F>>>,
}

impl<F> Cube<F>
where
    F: Element,
{
    pub fn new() -> Self {
        Self {
            coords: vec![],
            factories: vec![],
        }
    }

    pub fn add_coord(&mut self, coord: Coord<F>, dims: &[usize]) -> Arc<Coord<F>> {
        let coord = Arc::new(coord);
        self.coords.push((Arc::clone(&coord), dims.to_vec()));

        coord
    }

    pub fn coord(&self, name: &str) -> Arc<Coord<F>> {
        self.coords
            .iter()
            .find(|(coord, _)| coord.name() == name)
            .map(|(coord, _)| Arc::clone(coord))
            .unwrap_or_else(|| panic!("No coordinate named {name}"))
    }

    pub fn coord_dims(&self, coord: &Arc<Coord<F>>) -> Vec<usize> {
        self.coords
            .iter()
            .find(|(candidate, _)| Arc::ptr_eq(candidate, coord))
            .map(|(_, dims)| dims.clone())
            .unwrap_or_else(|| panic!("Coordinate {} not in cube", coord.name()))
    }

    pub fn add_factory(&mut self, factory: impl AuxCoordFactory<F> + 'static) {
        self.factories.push(Box::new(factory));
    }

    pub fn factory(&self, name: &str) -> &dyn AuxCoordFactory<F> {
        self.factories
            .iter()
            .find(|factory| factory.name() == name)
            .map(|factory| factory.as_ref())
            .unwrap_or_else(|| panic!("No factory named {name}"))
    }

    pub fn remove_factory(&mut self, name: &str) {
        self.factories.retain(|factory| factory.name() != name);
    }

    pub fn derived_dims(&self, name: &str) -> Vec<usize> {
        self.factory(name)
            .derived_dims(&|coord: &Arc<Coord<F>>| self.coord_dims(coord))
    }

    pub fn derived_coord(&self, name: &str) -> Result<Coord<F>> {
        self.factory(name)
            .make_coord(&|coord: &Arc<Coord<F>>| self.coord_dims(coord))
    }

    /// Remove a coordinate, notifying factories first.
    pub fn remove_coord(&mut self, name: &str) -> Result<()> {
        let coord = self.coord(name);
        for factory in self.factories.iter_mut() {
            factory.update(&coord, None)?;
        }
        self.coords.retain(|(candidate, _)| !Arc::ptr_eq(candidate, &coord));

        Ok(())
    }

    /// Replace the coordinate with the same name as `coord`, notifying factories first.
    pub fn replace_coord(&mut self, coord: Coord<F>) -> Result<Arc<Coord<F>>> {
        let old = self.coord(coord.name());
        let new = Arc::new(coord);
        for factory in self.factories.iter_mut() {
            factory.update(&old, Some(Arc::clone(&new)))?;
        }
        for (candidate, _) in self.coords.iter_mut() {
            if Arc::ptr_eq(candidate, &old) {
                *candidate = Arc::clone(&new);
            }
        }

        Ok(new)
    }

    /// Copy the cube, with copies of all its coordinates and factories repointed at the copies.
    pub fn copy(&self) -> Result<Self> {
        let mut mapping = CoordMapping::new();
        let mut coords = vec![];
        for (coord, dims) in &self.coords {
            let copy = Arc::new(Coord::clone(coord));
            mapping.insert(Coord::id(coord), Arc::clone(&copy));
            coords.push((copy, dims.clone()));
        }

        let factories = self
            .factories
            .iter()
            .map(|factory| factory.updated(&mapping))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { coords, factories })
    }
}

pub(crate) fn coord<F>(points: ArrayD<F>, long_name: &str, units: &str) -> Coord<F>
where
    F: Element,
{
    Coord::new(points, CoordMetadata::new(units).with_long_name(long_name))
}

/// Convert test data to another element type.
pub(crate) fn cast<F>(array: ArrayD<f64>) -> ArrayD<F>
where
    F: Element,
{
    array.mapv(|value| num_traits::cast(value).unwrap())
}

/// A small 4d cube, (time: 2, model_level: 4, grid_latitude: 3, grid_longitude: 5), with a
/// hybrid height factory over bounded level_height and sigma and unbounded surface_altitude.
///
pub(crate) fn realistic_4d<F>() -> Cube<F>
where
    F: Element,
{
    let mut cube = Cube::new();

    let time = coord(cast(array![0.0, 1.0].into_dyn()), "time", "1");
    cube.add_coord(time, &[0]);

    let level_height = coord(
        cast(array![5.0, 21.5, 45.0, 76.5].into_dyn()),
        "level_height",
        "m",
    )
    .with_bounds(cast::<F>(
        array![[0.0, 13.0], [13.0, 33.0], [33.0, 60.0], [60.0, 96.0]].into_dyn(),
    ))
    .unwrap();
    let level_height = cube.add_coord(level_height, &[1]);

    let sigma = coord(
        cast(array![0.999, 0.997, 0.994, 0.99].into_dyn()),
        "sigma",
        "1",
    )
    .with_bounds(cast::<F>(
        array![[1.0, 0.998], [0.998, 0.995], [0.995, 0.992], [0.992, 0.987]].into_dyn(),
    ))
    .unwrap();
    let sigma = cube.add_coord(sigma, &[1]);

    let values = (0..15).map(|i| 100.0 + 10.0 * (i / 5) as f64 + (i % 5) as f64).collect();
    let orography = Coord::new(
        cast::<F>(Array::from_shape_vec(IxDyn(&[3, 5]), values).unwrap()),
        CoordMetadata::new("m").with_standard_name("surface_altitude"),
    );
    let orography = cube.add_coord(orography, &[2, 3]);

    let factory =
        HybridHeightFactory::new(Some(level_height), Some(sigma), Some(orography)).unwrap();
    cube.add_factory(factory);

    cube
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f`, returning its result along with any warnings it logged.
pub(crate) fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let output = String::from_utf8_lossy(&capture.0.lock()).into_owned();

    (result, output)
}
