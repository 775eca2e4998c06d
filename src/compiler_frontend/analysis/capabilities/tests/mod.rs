mod contract_tests;
mod registry_tests;
