mod hir_validation_tests;
