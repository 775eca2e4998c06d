
mod abort_boundary_tests;
mod construction_tests;
mod elaboration_property_tests;
