mod property {
    mod cardinality;
    mod expression;
}
