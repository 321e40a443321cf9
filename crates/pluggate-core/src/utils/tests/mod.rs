mod memoize_tests;
